//! インメモリ実装（プロセス再起動で状態は消える）

pub mod connection;
pub mod room;

pub use connection::InMemoryConnectionRegistry;
pub use room::InMemoryRoomStore;
