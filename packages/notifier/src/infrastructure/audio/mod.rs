//! 音声再生（AudioPlayer）の実装
//!
//! - `command`: 外部プレイヤープロセス（mpv, ffplay など）に標準入力でクリップを渡す実装

pub mod command;

pub use command::CommandAudioPlayer;
