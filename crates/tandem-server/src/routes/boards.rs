//! Board and card read endpoints

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use tandem_core::storage::{BoardStore, Card, Database, HistoryEntry, Lane};

use crate::error::AppError;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:board_id", get(get_board))
        .route("/:board_id/cards", get(list_cards))
        .route("/cards/:card_id/history", get(card_history))
}

#[derive(Serialize)]
struct BoardView {
    board_id: String,
    lanes: Vec<LaneView>,
}

#[derive(Serialize)]
struct LaneView {
    #[serde(flatten)]
    lane: Lane,
    cards: Vec<Card>,
}

/// Full board snapshot: every lane in order with its cards by position.
async fn get_board(
    State(state): State<AppState>,
    Path(board_id): Path<String>,
) -> Result<Json<BoardView>, AppError> {
    let db = Database::new(&state.db_path)?;
    let store = BoardStore::new(&db);

    let lanes = store.lanes(&board_id)?;
    if lanes.is_empty() {
        return Err(AppError::NotFound(format!("board '{board_id}' not found")));
    }

    let mut views = Vec::with_capacity(lanes.len());
    for lane in lanes {
        let cards = store.cards_for_lane(&lane.id)?;
        views.push(LaneView { lane, cards });
    }

    Ok(Json(BoardView {
        board_id,
        lanes: views,
    }))
}

async fn list_cards(
    State(state): State<AppState>,
    Path(board_id): Path<String>,
) -> Result<Json<Vec<Card>>, AppError> {
    let db = Database::new(&state.db_path)?;
    let cards = BoardStore::new(&db).cards_for_board(&board_id)?;
    Ok(Json(cards))
}

async fn card_history(
    State(state): State<AppState>,
    Path(card_id): Path<String>,
) -> Result<Json<Vec<HistoryEntry>>, AppError> {
    let db = Database::new(&state.db_path)?;
    let history = BoardStore::new(&db).history_for_card(&card_id)?;
    Ok(Json(history))
}
