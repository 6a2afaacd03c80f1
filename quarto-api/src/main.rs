//! Quarto Web API
//!
//! Local backend for a browser frontend where two players share one device.
//! Holds a single game in memory and exposes its state and commands as JSON.
//! Rejected commands answer 400 and leave the game untouched.

mod cli;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use quarto_core::{Command, Game, Phase, Piece, Pos};

use crate::cli::Cli;

// =============================================================================
// Session State
// =============================================================================

/// Shared application state
struct AppStateInner {
    game: Mutex<Game>,
}

impl AppStateInner {
    fn new() -> Self {
        Self {
            game: Mutex::new(Game::new()),
        }
    }

    /// Lock the game. Every command leaves the game consistent, so a
    /// poisoned lock still holds a usable game.
    fn game(&self) -> MutexGuard<'_, Game> {
        self.game.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

type AppState = Arc<AppStateInner>;

// =============================================================================
// JSON Models
// =============================================================================

#[derive(Serialize)]
struct PieceModel {
    id: u8,
    code: String,
    title: String,
    asset: String,
    used: bool,
}

#[derive(Serialize)]
struct GameStateModel {
    /// Piece codes by row, null for empty cells
    board: Vec<Vec<Option<String>>>,
    /// Player placing this turn (0 or 1)
    current_player: u8,
    turn: u32,
    phase: Phase,
    selected_piece: Option<PieceModel>,
    unused_pieces: Vec<u8>,
    last_placed: Option<Pos>,
    winning_cells: Vec<Pos>,
    game_over: bool,
    draw: bool,
    can_undo: bool,
    prompt: String,
}

#[derive(Deserialize)]
struct SelectRequest {
    piece: u8,
}

#[derive(Deserialize)]
struct PlaceRequest {
    row: u8,
    col: u8,
}

#[derive(Serialize)]
struct LogModel {
    entries: Vec<String>,
}

#[derive(Serialize)]
struct HealthModel {
    status: String,
}

#[derive(Serialize)]
struct ErrorModel {
    detail: String,
}

type ApiResult = Result<Json<GameStateModel>, (StatusCode, Json<ErrorModel>)>;

// =============================================================================
// Conversion Functions
// =============================================================================

fn piece_to_model(piece: &Piece, used: bool) -> PieceModel {
    PieceModel {
        id: piece.id.index(),
        code: piece.code(),
        title: piece.title(),
        asset: piece.asset_path(),
        used,
    }
}

/// Convert Game to JSON-serializable GameStateModel
fn game_to_model(game: &Game) -> GameStateModel {
    let board = game
        .board()
        .rows()
        .iter()
        .map(|row| row.iter().map(|cell| cell.map(|id| id.to_string())).collect())
        .collect();

    GameStateModel {
        board,
        current_player: game.current_player().index(),
        turn: game.turn(),
        phase: game.phase(),
        selected_piece: game.selected_piece().map(|p| piece_to_model(p, false)),
        unused_pieces: game.unused_pieces().map(|p| p.id.index()).collect(),
        last_placed: game.last_placed(),
        winning_cells: game.winning_cells().to_vec(),
        game_over: game.is_game_over(),
        draw: game.is_draw(),
        can_undo: game.can_undo(),
        prompt: game.prompt(),
    }
}

/// Apply a command and answer with the new state, or 400 with the reason.
fn run_command(state: &AppState, command: Command) -> ApiResult {
    let mut game = state.game();
    match game.apply(command) {
        Ok(()) => {
            info!(?command, turn = game.turn(), "command applied");
            Ok(Json(game_to_model(&game)))
        }
        Err(err) => {
            debug!(?command, %err, "command rejected");
            Err((
                StatusCode::BAD_REQUEST,
                Json(ErrorModel {
                    detail: err.to_string(),
                }),
            ))
        }
    }
}

// =============================================================================
// API Endpoints
// =============================================================================

async fn get_game(State(state): State<AppState>) -> Json<GameStateModel> {
    let game = state.game();
    Json(game_to_model(&game))
}

async fn get_pieces(State(state): State<AppState>) -> Json<Vec<PieceModel>> {
    let game = state.game();
    let catalog = game.catalog();
    Json(
        catalog
            .iter()
            .map(|p| piece_to_model(p, catalog.is_used(p.id)))
            .collect(),
    )
}

async fn get_log(State(state): State<AppState>) -> Json<LogModel> {
    let game = state.game();
    Json(LogModel {
        entries: game.log().to_vec(),
    })
}

async fn select_piece(State(state): State<AppState>, Json(req): Json<SelectRequest>) -> ApiResult {
    run_command(&state, Command::Select { piece: req.piece })
}

async fn place_piece(State(state): State<AppState>, Json(req): Json<PlaceRequest>) -> ApiResult {
    run_command(
        &state,
        Command::Place {
            row: req.row,
            col: req.col,
        },
    )
}

async fn undo(State(state): State<AppState>) -> ApiResult {
    run_command(&state, Command::Undo)
}

async fn reset_game(State(state): State<AppState>) -> ApiResult {
    run_command(&state, Command::Reset)
}

async fn apply_command(State(state): State<AppState>, Json(command): Json<Command>) -> ApiResult {
    run_command(&state, command)
}

async fn health() -> Json<HealthModel> {
    Json(HealthModel {
        status: "ok".to_string(),
    })
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/game", get(get_game))
        .route("/pieces", get(get_pieces))
        .route("/log", get(get_log))
        .route("/select", post(select_piece))
        .route("/place", post(place_piece))
        .route("/undo", post(undo))
        .route("/reset", post(reset_game))
        .route("/command", post(apply_command))
        .route("/health", get(health))
        .with_state(state)
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let state: AppState = Arc::new(AppStateInner::new());

    let mut app = router(state);
    if let Some(dir) = &cli.static_dir {
        info!(dir = %dir.display(), "serving frontend files");
        app = app.fallback_service(ServeDir::new(dir));
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let app = app.layer(cors).layer(TraceLayer::new_for_http());

    let addr = cli.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Quarto API running on http://{addr}");
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
