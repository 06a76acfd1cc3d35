//! Value Objects
//!
//! 識別子や言語など、不変で自己検証する値を定義します。
//! 生の文字列は UI / DTO 層でこれらの型に変換してからユースケースに渡します。

use std::fmt;

use uuid::Uuid;

use super::error::ValueObjectError;

/// ユーザー名・ルーム ID の最大長
const MAX_NAME_LENGTH: usize = 100;

/// トランスポート接続 1 本を識別する ID
///
/// ユーザー単位ではなく接続単位で一意（同じユーザーが複数タブを開くと複数の ID を持つ）。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new(id: String) -> Result<Self, ValueObjectError> {
        if id.trim().is_empty() {
            return Err(ValueObjectError::ConnectionIdEmpty);
        }
        Ok(Self(id))
    }

    /// Allocate a fresh random connection id (UUID v4).
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ConnectionId {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// クライアントが指定する不透明なルーム ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(id: String) -> Result<Self, ValueObjectError> {
        if id.trim().is_empty() {
            return Err(ValueObjectError::RoomIdEmpty);
        }
        if id.chars().count() > MAX_NAME_LENGTH {
            return Err(ValueObjectError::RoomIdTooLong(MAX_NAME_LENGTH));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RoomId {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 表示用のユーザー名（認証はしない）
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Username(String);

impl Username {
    pub fn new(name: String) -> Result<Self, ValueObjectError> {
        if name.trim().is_empty() {
            return Err(ValueObjectError::UsernameEmpty);
        }
        if name.chars().count() > MAX_NAME_LENGTH {
            return Err(ValueObjectError::UsernameTooLong(MAX_NAME_LENGTH));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Username {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// ルームで選択できる言語（閉じた集合）
///
/// 言語を追加する場合はここにバリアントを足す。クライアント側の変更は不要。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Language {
    #[default]
    JavaScript,
    Java,
    Cpp,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::JavaScript, Language::Java, Language::Cpp];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::JavaScript => "javascript",
            Language::Java => "java",
            Language::Cpp => "cpp",
        }
    }
}

impl TryFrom<&str> for Language {
    type Error = ValueObjectError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Language::ALL
            .into_iter()
            .find(|language| language.as_str() == value)
            .ok_or_else(|| ValueObjectError::UnsupportedLanguage(value.to_string()))
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unix タイムスタンプ（ミリ秒）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(i64);

impl Timestamp {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}
