//! HTTP API response DTOs.

use serde::Deserialize;

use super::websocket::PatientDto;

/// One row of `GET /consultorios/turnos/detallados`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoomTurnRowDto {
    #[serde(default)]
    pub room_id: Option<u32>,
    #[serde(default, alias = "consultorio")]
    pub room_label: Option<String>,
    #[serde(default)]
    pub current_turn: Option<u32>,
    #[serde(default, alias = "label")]
    pub current_turn_label: Option<String>,
    #[serde(default, alias = "paciente")]
    pub patient: Option<PatientDto>,
}
