//! UseCase: コード実行結果の共有
//!
//! 実行自体はクライアント側で行い、結果だけをルームに投稿するのが基本の流れ。
//! サーバー側実行が有効な場合は、設定された `CodeExecutor` をタイムアウト付きで呼び出し、
//! 結果を全員に配信する。実行の失敗は例外ではなく `error` の結果として扱う。

use std::{sync::Arc, time::Duration};

use crate::domain::{
    CodeExecutor, ConnectionId, ExecutionOutcome, ExecutionReport, Language, MessagePusher,
    OutcomeResult, RepositoryError, RoomId, RoomStore, ServerEvent, Username, broadcast_targets,
};

use super::{RoomSequencer, error::EventError};

/// 実行結果共有のユースケース
pub struct ExecutionUseCase {
    store: Arc<dyn RoomStore>,
    message_pusher: Arc<dyn MessagePusher>,
    sequencer: Arc<RoomSequencer>,
    /// `None` ならサーバー側実行は無効
    executor: Option<Arc<dyn CodeExecutor>>,
    execution_timeout: Duration,
}

impl ExecutionUseCase {
    pub fn new(
        store: Arc<dyn RoomStore>,
        message_pusher: Arc<dyn MessagePusher>,
        sequencer: Arc<RoomSequencer>,
        executor: Option<Arc<dyn CodeExecutor>>,
        execution_timeout: Duration,
    ) -> Self {
        Self {
            store,
            message_pusher,
            sequencer,
            executor,
            execution_timeout,
        }
    }

    /// `execute-code`: 開始通知を全員に送り、サーバー側実行が有効なら実行する
    ///
    /// 実行中はルームの順番を手放す。結果の記録と配信で取り直す。
    ///
    /// # Returns
    ///
    /// サーバー側で実行した場合はその結果
    pub async fn start(
        &self,
        sender: &ConnectionId,
        room_id: &RoomId,
        executed_by: &Username,
        language: Option<&str>,
        code: Option<String>,
    ) -> Result<Option<ExecutionOutcome>, EventError> {
        let language = language.map(Language::try_from).transpose()?;

        let turn = self.sequencer.acquire(room_id).await;
        let result = self
            .announce_in_turn(sender, room_id, executed_by, language, code)
            .await;
        self.sequencer.release(room_id, turn).await;
        let Some((executor, language, code)) = result? else {
            return Ok(None);
        };

        tracing::info!(
            "Executing {} code for '{}' in room '{}'",
            language,
            executed_by,
            room_id
        );
        let report = self.run(executor.as_ref(), language, &code).await;
        let outcome = ExecutionOutcome {
            result: report.result,
            executed_by: executed_by.clone(),
            execution_time_ms: report.duration_ms,
        };

        let turn = self.sequencer.acquire(room_id).await;
        let result = self.publish_in_turn(room_id, outcome.clone(), None).await;
        self.sequencer.release(room_id, turn).await;
        result?;
        Ok(Some(outcome))
    }

    /// 開始通知を送り、サーバー側実行に必要なものを揃える
    async fn announce_in_turn(
        &self,
        sender: &ConnectionId,
        room_id: &RoomId,
        executed_by: &Username,
        language: Option<Language>,
        code: Option<String>,
    ) -> Result<Option<(Arc<dyn CodeExecutor>, Language, String)>, EventError> {
        let members = self.store.members(room_id).await?;
        EventError::require_member(&members, sender, room_id)?;

        let start = ServerEvent::ExecutionStart {
            executed_by: executed_by.clone(),
        };
        if let Err(e) = self
            .message_pusher
            .broadcast(broadcast_targets(&members, None), &start)
            .await
        {
            tracing::warn!("Failed to broadcast execution-start: {}", e);
        }

        let Some(executor) = &self.executor else {
            return Ok(None);
        };

        let language = match language {
            Some(language) => language,
            None => self
                .store
                .get_room(room_id)
                .await
                .map(|room| room.language)
                .ok_or_else(|| RepositoryError::RoomNotFound(room_id.to_string()))?,
        };
        let code = match code {
            Some(code) => code,
            None => self.store.get_code(room_id).await?,
        };
        Ok(Some((executor.clone(), language, code)))
    }

    /// 実行結果を記録し、`skip` 以外のメンバーに配信する
    async fn publish_in_turn(
        &self,
        room_id: &RoomId,
        outcome: ExecutionOutcome,
        skip: Option<&ConnectionId>,
    ) -> Result<(), EventError> {
        self.store.record_outcome(room_id, outcome.clone()).await?;
        let members = self.store.members(room_id).await?;
        let notice = ServerEvent::from_outcome(room_id.clone(), outcome);
        if let Err(e) = self
            .message_pusher
            .broadcast(broadcast_targets(&members, skip), &notice)
            .await
        {
            tracing::warn!("Failed to broadcast {}: {}", notice.name(), e);
        }
        Ok(())
    }

    /// クライアントが投稿した実行結果を記録し、送信者以外に配信する
    pub async fn record(
        &self,
        sender: &ConnectionId,
        room_id: &RoomId,
        executed_by: &Username,
        result: OutcomeResult,
        execution_time_ms: u64,
    ) -> Result<(), EventError> {
        let outcome = ExecutionOutcome {
            result,
            executed_by: executed_by.clone(),
            execution_time_ms,
        };

        let turn = self.sequencer.acquire(room_id).await;
        let result = self.record_in_turn(sender, room_id, outcome).await;
        self.sequencer.release(room_id, turn).await;
        result
    }

    async fn record_in_turn(
        &self,
        sender: &ConnectionId,
        room_id: &RoomId,
        outcome: ExecutionOutcome,
    ) -> Result<(), EventError> {
        let members = self.store.members(room_id).await?;
        EventError::require_member(&members, sender, room_id)?;
        self.publish_in_turn(room_id, outcome, Some(sender)).await
    }

    /// 実行結果を消し、送信者以外に `clear-output` を送る
    pub async fn clear(
        &self,
        sender: &ConnectionId,
        room_id: &RoomId,
        cleared_by: &Username,
    ) -> Result<(), EventError> {
        let turn = self.sequencer.acquire(room_id).await;
        let result = self.clear_in_turn(sender, room_id, cleared_by).await;
        self.sequencer.release(room_id, turn).await;
        result
    }

    async fn clear_in_turn(
        &self,
        sender: &ConnectionId,
        room_id: &RoomId,
        cleared_by: &Username,
    ) -> Result<(), EventError> {
        let members = self.store.members(room_id).await?;
        EventError::require_member(&members, sender, room_id)?;

        self.store.clear_outcome(room_id).await?;
        let notice = ServerEvent::ClearOutput {
            room_id: room_id.clone(),
            cleared_by: cleared_by.clone(),
        };
        if let Err(e) = self
            .message_pusher
            .broadcast(broadcast_targets(&members, Some(sender)), &notice)
            .await
        {
            tracing::warn!("Failed to broadcast clear-output: {}", e);
        }
        Ok(())
    }

    async fn run(
        &self,
        executor: &dyn CodeExecutor,
        language: Language,
        code: &str,
    ) -> ExecutionReport {
        let execution = executor.execute(language, code);
        match tokio::time::timeout(self.execution_timeout, execution).await {
            Ok(report) => report,
            Err(_) => {
                let timeout_ms =
                    u64::try_from(self.execution_timeout.as_millis()).unwrap_or(u64::MAX);
                tracing::warn!("Execution timed out after {:?}", self.execution_timeout);
                ExecutionReport::failed(
                    format!(
                        "Execution timeout: Code took longer than {} seconds to execute",
                        self.execution_timeout.as_secs_f64()
                    ),
                    timeout_ms,
                )
            }
        }
    }
}
