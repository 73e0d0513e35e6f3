//! Line-oriented debug driver.
//!
//! Understands a small UCI subset: `uci`, `isready`, `setoption`,
//! `ucinewgame`, `position`, `eval` and `quit`. Networks are loaded on the
//! first command that needs them and again after an `EvalFile*` change.

use std::io::{self, BufRead};
use std::sync::Arc;

use thiserror::Error;

use crate::board::{Board, FenError, MoveParseError};
use crate::config::{parse_setoption, EvalOptionAction, EvalOptions};
use crate::evaluate::Evaluator;
use crate::nnue::{NetworkRegistry, Networks, NnueState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Uci,
    IsReady,
    UciNewGame,
    Position(Vec<String>),
    SetOption(Vec<String>),
    Eval,
    Quit,
    Unknown(String),
}

#[must_use]
pub fn parse_command(line: &str) -> Option<Command> {
    let trimmed = line.trim();
    let parts: Vec<&str> = trimmed.split_whitespace().collect();
    let first = *parts.first()?;
    let owned_parts = || parts.iter().map(|p| (*p).to_string()).collect::<Vec<String>>();

    let cmd = match first {
        "uci" => Command::Uci,
        "isready" => Command::IsReady,
        "ucinewgame" => Command::UciNewGame,
        "position" => Command::Position(owned_parts()),
        "setoption" => Command::SetOption(owned_parts()),
        "eval" => Command::Eval,
        "quit" => Command::Quit,
        _ => Command::Unknown(trimmed.to_string()),
    };
    Some(cmd)
}

#[derive(Debug, Error)]
pub enum PositionError {
    #[error("invalid FEN: {0}")]
    InvalidFen(#[from] FenError),
    #[error("invalid move '{move_str}': {error}")]
    InvalidMove {
        move_str: String,
        error: MoveParseError,
    },
    #[error("missing required parts in position command")]
    MissingParts,
}

/// Parse `position startpos|fen <6 fields> [moves ...]` into a board.
pub fn parse_position(parts: &[&str]) -> Result<Board, PositionError> {
    let mut i = 1;
    let mut board = match parts.get(i) {
        Some(&"startpos") => {
            i += 1;
            Board::new()
        }
        Some(&"fen") => {
            if i + 6 >= parts.len() {
                return Err(PositionError::MissingParts);
            }
            let fen = parts[i + 1..i + 7].join(" ");
            i += 7;
            Board::try_from_fen(&fen)?
        }
        _ => return Err(PositionError::MissingParts),
    };

    if parts.get(i) == Some(&"moves") {
        for move_str in &parts[i + 1..] {
            let mv = board.parse_legal_move(move_str).map_err(|error| PositionError::InvalidMove {
                move_str: (*move_str).to_string(),
                error,
            })?;
            board.make_move(mv);
        }
    }
    Ok(board)
}

/// Driver state between commands.
pub struct Driver {
    options: EvalOptions,
    registry: NetworkRegistry,
    networks: Option<Arc<Networks>>,
    evaluator: Evaluator,
    board: Board,
}

impl Default for Driver {
    fn default() -> Self {
        Self::new()
    }
}

impl Driver {
    #[must_use]
    pub fn new() -> Self {
        Driver {
            options: EvalOptions::new(),
            registry: NetworkRegistry::default(),
            networks: None,
            evaluator: Evaluator::default(),
            board: Board::new(),
        }
    }

    /// Driver with networks already in place, skipping file loading.
    #[must_use]
    pub fn with_networks(nets: Networks) -> Self {
        let mut driver = Self::new();
        driver.networks = Some(driver.registry.install(nets));
        driver
    }

    #[must_use]
    pub fn board(&self) -> &Board {
        &self.board
    }

    fn networks(&mut self) -> Arc<Networks> {
        if let Some(nets) = &self.networks {
            return Arc::clone(nets);
        }
        let nets = self.registry.reload_or_exit(&self.options);
        self.networks = Some(Arc::clone(&nets));
        nets
    }

    /// Handle one command. Returns false once the driver should stop.
    pub fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Uci => {
                println!("id name nnue_eval");
                self.options.print();
                println!("uciok");
            }
            Command::IsReady => {
                self.networks();
                println!("readyok");
            }
            Command::UciNewGame => self.board = Board::new(),
            Command::Position(parts) => {
                let parts: Vec<&str> = parts.iter().map(String::as_str).collect();
                match parse_position(&parts) {
                    Ok(board) => self.board = board,
                    Err(e) => eprintln!("Error: {e}"),
                }
            }
            Command::SetOption(parts) => {
                let parts: Vec<&str> = parts.iter().map(String::as_str).collect();
                if let Some((name, value)) = parse_setoption(&parts) {
                    if let Some(EvalOptionAction::ReloadNetworks) =
                        self.options.apply_setoption(&name, value.as_deref())
                    {
                        log::debug!("{name} changed, networks reload on next use");
                        self.networks = None;
                    }
                }
            }
            Command::Eval => {
                let nets = self.networks();
                println!("{}", self.evaluator.trace(&self.board, &nets));
            }
            Command::Quit => return false,
            Command::Unknown(line) => log::debug!("ignoring unknown command: {line}"),
        }
        true
    }

    /// Score of the current position from the side to move's point of view.
    pub fn evaluate(&mut self) -> Option<i32> {
        if self.board.in_check() {
            return None;
        }
        let nets = self.networks();
        let mut state = NnueState::new(&nets, &self.board);
        Some(self.evaluator.evaluate(&self.board, &nets, &mut state, 0))
    }
}

/// Read commands from standard input until `quit` or end of input.
pub fn run() {
    let mut driver = Driver::new();
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        if let Some(command) = parse_command(&line) {
            if !driver.handle(command) {
                break;
            }
        }
    }
}
