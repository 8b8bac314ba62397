#![forbid(unsafe_code)]

pub mod evaluator;
pub mod match_board;
pub mod model;
pub mod time;

pub use evaluator::{EvaluationError, evaluate};
pub use match_board::{MatchBoard, MatchBoardError};
pub use time::Clock;
