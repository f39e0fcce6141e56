//! reqwest を使った QueueApi 実装
//!
//! タイムアウトは設定しない。応答が止まった場合は次の判断が遅れるだけで、
//! 失敗として扱わない。

use async_trait::async_trait;

use crate::{
    domain::{AudioClip, FetchError, QueueApi, RoomId, RoomTurnSnapshot},
    infrastructure::dto::http::RoomTurnRowDto,
};

const SNAPSHOT_PATH: &str = "/consultorios/turnos/detallados";

/// 受付システムの HTTP API クライアント
#[derive(Debug, Clone)]
pub struct HttpQueueApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpQueueApi {
    /// 新しい HttpQueueApi を作成
    ///
    /// # Arguments
    ///
    /// * `base_url` - API のベース URL（例: "http://127.0.0.1:8000"）
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn snapshot_url(&self) -> String {
        format!("{}{}", self.base_url, SNAPSHOT_PATH)
    }

    pub fn audio_url(&self, room: RoomId) -> String {
        format!("{}/consultorios/{}/audio", self.base_url, room)
    }

    pub fn advance_url(&self, room: RoomId) -> String {
        format!("{}/consultorios/{}/next", self.base_url, room)
    }
}

/// Map a non-success status to `FetchError::Status`
fn check_status(response: reqwest::Response) -> Result<reqwest::Response, FetchError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(FetchError::Status {
            status: status.as_u16(),
            url: response.url().to_string(),
        })
    }
}

fn request_error(e: reqwest::Error) -> FetchError {
    FetchError::Request(e.to_string())
}

#[async_trait]
impl QueueApi for HttpQueueApi {
    async fn fetch_snapshots(&self) -> Result<Vec<RoomTurnSnapshot>, FetchError> {
        let response = self
            .client
            .get(self.snapshot_url())
            .send()
            .await
            .map_err(request_error)?;
        let rows: Vec<RoomTurnRowDto> = check_status(response)?
            .json()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))?;

        let snapshots = rows
            .into_iter()
            .filter_map(|row| match RoomTurnSnapshot::try_from(row) {
                Ok(snapshot) => Some(snapshot),
                Err(e) => {
                    tracing::warn!("Skipping snapshot row: {}", e);
                    None
                }
            })
            .collect();

        Ok(snapshots)
    }

    async fn fetch_audio(&self, room: RoomId) -> Result<AudioClip, FetchError> {
        let response = self
            .client
            .get(self.audio_url(room))
            .send()
            .await
            .map_err(request_error)?;
        let bytes = check_status(response)?
            .bytes()
            .await
            .map_err(request_error)?;

        Ok(AudioClip::new(bytes.to_vec()))
    }

    async fn advance_turn(&self, room: RoomId) -> Result<(), FetchError> {
        let response = self
            .client
            .patch(self.advance_url(room))
            .send()
            .await
            .map_err(request_error)?;
        check_status(response)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_are_built_from_base() {
        // テスト項目: ベース URL の末尾スラッシュに関係なくエンドポイント URL が組み立てられる
        // given (前提条件):
        let api = HttpQueueApi::new("http://127.0.0.1:8000/");
        let room = RoomId::new(2).unwrap();

        // when (操作):
        let snapshot = api.snapshot_url();
        let audio = api.audio_url(room);
        let advance = api.advance_url(room);

        // then (期待する結果):
        assert_eq!(
            snapshot,
            "http://127.0.0.1:8000/consultorios/turnos/detallados"
        );
        assert_eq!(audio, "http://127.0.0.1:8000/consultorios/2/audio");
        assert_eq!(advance, "http://127.0.0.1:8000/consultorios/2/next");
    }
}
