//! External-process audio player.
//!
//! The clip is written to the player's stdin and playback is considered
//! finished when the process exits.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::{io::AsyncWriteExt, process::Command};

use crate::domain::{AudioClip, AudioPlayer, PlaybackError, RoomId};

/// Default player: mpv reading from stdin, no window, no terminal output
pub const DEFAULT_PLAYER_COMMAND: &str = "mpv --no-video --really-quiet -";

#[derive(Debug, Clone)]
pub struct CommandAudioPlayer {
    program: String,
    args: Vec<String>,
}

impl CommandAudioPlayer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Parse a whitespace-separated command line (no quoting support).
    pub fn from_command_line(command_line: &str) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect()))
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl Default for CommandAudioPlayer {
    fn default() -> Self {
        Self::new(
            "mpv",
            vec![
                "--no-video".to_string(),
                "--really-quiet".to_string(),
                "-".to_string(),
            ],
        )
    }
}

#[async_trait]
impl AudioPlayer for CommandAudioPlayer {
    async fn play(&self, room: RoomId, clip: &AudioClip) -> Result<(), PlaybackError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PlaybackError::Spawn(format!("{}: {}", self.program, e)))?;

        tracing::debug!(
            "Playing {} bytes for room {} with {}",
            clip.len(),
            room,
            self.program
        );

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(clip.as_bytes())
                .await
                .map_err(|e| PlaybackError::Io(e.to_string()))?;
            // Dropping stdin signals end of input to the player
            drop(stdin);
        }

        let status = child
            .wait()
            .await
            .map_err(|e| PlaybackError::Io(e.to_string()))?;

        if status.success() {
            Ok(())
        } else {
            Err(PlaybackError::Exit(status.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_command_line_splits_program_and_args() {
        // テスト項目: コマンドライン文字列がプログラムと引数に分割される
        // given (前提条件):
        let command_line = "ffplay -nodisp -autoexit -";

        // when (操作):
        let player = CommandAudioPlayer::from_command_line(command_line).unwrap();

        // then (期待する結果):
        assert_eq!(player.program(), "ffplay");
        assert_eq!(player.args(), ["-nodisp", "-autoexit", "-"]);
    }

    #[test]
    fn test_from_command_line_rejects_empty() {
        // テスト項目: 空のコマンドラインからはプレイヤーを作れない
        // given (前提条件):
        let command_line = "   ";

        // when (操作):
        let player = CommandAudioPlayer::from_command_line(command_line);

        // then (期待する結果):
        assert!(player.is_none());
    }

    #[test]
    fn test_default_matches_default_command_line() {
        // テスト項目: Default と DEFAULT_PLAYER_COMMAND が同じ設定になる
        // given (前提条件):
        let parsed = CommandAudioPlayer::from_command_line(DEFAULT_PLAYER_COMMAND).unwrap();

        // when (操作):
        let default = CommandAudioPlayer::default();

        // then (期待する結果):
        assert_eq!(parsed.program(), default.program());
        assert_eq!(parsed.args(), default.args());
    }

    #[tokio::test]
    async fn test_play_reports_spawn_failure() {
        // テスト項目: 存在しないプレイヤーは Spawn エラーになる
        // given (前提条件):
        let player = CommandAudioPlayer::new("madoguchi-no-such-player", vec![]);
        let room = RoomId::new(1).unwrap();

        // when (操作):
        let result = player.play(room, &AudioClip::new(vec![0, 1, 2])).await;

        // then (期待する結果):
        assert!(matches!(result, Err(PlaybackError::Spawn(_))));
    }
}
