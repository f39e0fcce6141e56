//! UseCase: 番号変化の検出（Turn Change Detector）
//!
//! 診察室ごとに最後に見た番号とラベルを覚えておき、ラベルが変わった診察室だけを
//! 呼び出し対象として返します。スナップショットがプッシュ由来かポーリング由来かは
//! 区別しません。同じ変化を両方から受け取っても、2 回目はラベルが一致するため
//! 呼び出しは 1 回だけになります。
//!
//! 呼び出し中の診察室で、同じ系列（ラベルの接頭辞が同じ）の小さい番号が届いた場合は
//! 古い取得結果とみなして無視します。記録を巻き戻すと、次の正しい結果で同じ変化を
//! もう一度呼び出してしまうためです。0 への戻り（リセット）はそのまま記録します。

use std::collections::HashMap;

use crate::domain::{RoomId, RoomTurnSnapshot, TurnLabel};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Observed {
    current_turn: u32,
    label: TurnLabel,
}

#[derive(Debug, Default)]
pub struct TurnChangeDetector {
    history: HashMap<RoomId, Observed>,
    /// 有効化後の最初のバッチを処理済みか
    primed: bool,
}

impl TurnChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// スナップショットのバッチを処理し、呼び出すべき診察室を返す
    ///
    /// - 有効化後の最初のバッチは記録するだけで、何も呼び出さない
    /// - 初めて見る診察室も記録のみ
    /// - 記録より古いスナップショット（[`Self::is_regression`]）は記録も更新しない
    /// - ラベルが変わり、かつ番号が 0 より大きい診察室を呼び出す
    /// - 呼び出しの成否に関係なく、記録は最新のラベルで上書きする
    pub fn observe_batch(&mut self, snapshots: &[RoomTurnSnapshot]) -> Vec<RoomId> {
        let first_batch = !self.primed;
        self.primed = true;

        let mut announcements = Vec::new();
        for snapshot in snapshots {
            if self.is_regression(snapshot) {
                tracing::debug!(
                    "Ignoring stale snapshot for room {}: {}",
                    snapshot.room,
                    snapshot.label
                );
                continue;
            }

            let previous = self.history.insert(
                snapshot.room,
                Observed {
                    current_turn: snapshot.current_turn,
                    label: snapshot.label.clone(),
                },
            );

            if first_batch {
                continue;
            }

            match previous {
                Some(previous) if previous.label != snapshot.label && snapshot.is_serving() => {
                    tracing::debug!(
                        "Room {} turn changed: {} -> {}",
                        snapshot.room,
                        previous.label,
                        snapshot.label
                    );
                    if !announcements.contains(&snapshot.room) {
                        announcements.push(snapshot.room);
                    }
                }
                _ => {}
            }
        }

        announcements
    }

    /// 記録済みの番号より古いスナップショットか
    ///
    /// 同じ系列のまま番号だけが小さくなった場合に `true`。番号 0 へのリセットと、
    /// 系列が変わった場合は `false`。
    pub fn is_regression(&self, snapshot: &RoomTurnSnapshot) -> bool {
        let Some(recorded) = self.history.get(&snapshot.room) else {
            return false;
        };
        snapshot.is_serving()
            && snapshot.current_turn < recorded.current_turn
            && snapshot.label.series() == recorded.label.series()
    }

    pub fn last_label(&self, room: RoomId) -> Option<&TurnLabel> {
        self.history.get(&room).map(|observed| &observed.label)
    }

    pub fn is_primed(&self) -> bool {
        self.primed
    }
}
