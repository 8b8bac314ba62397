use std::error::Error;

use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use activity_core::model::{
    AnswerStatus, Item, ItemKind, ItemPhase, SessionSummary, Submission, TerminalReason,
};
use activity_core::time::format_clock;
use activity_core::MatchBoard;
use services::{RunnerError, RunnerState, SessionRequest, SessionRunner};

// Remaining-time reminders are printed on whole minutes and for the last ten seconds.
const FINAL_SECONDS: u64 = 10;

enum Input {
    Line(String),
    Quit,
}

// End of input counts as leaving.
impl From<Option<String>> for Input {
    fn from(line: Option<String>) -> Self {
        match line {
            Some(line) if line.trim() == "quit" => Input::Quit,
            Some(line) => Input::Line(line),
            None => Input::Quit,
        }
    }
}

/// Line-oriented terminal front end for one session.
pub struct Console {
    lines: Lines<BufReader<Stdin>>,
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

impl Console {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    async fn read_line(&mut self) -> Result<Input, Box<dyn Error>> {
        Ok(Input::from(self.lines.next_line().await?))
    }

    pub async fn run(
        mut self,
        runner: &mut SessionRunner,
        request: SessionRequest,
    ) -> Result<(), Box<dyn Error>> {
        println!("Starting {} session...", request.kind);
        if let Err(err) = runner.start(request).await {
            return Err(err.user_message().into());
        }
        println!("Type 'quit' at any time to leave.");

        let mut redraw = true;
        while let RunnerState::InProgress(phase) = runner.state() {
            if redraw {
                render(runner, phase);
                redraw = false;
            }

            let input = tokio::select! {
                line = self.lines.next_line() => Input::from(line?),
                Some(event) = runner.next_event() => {
                    if runner.handle_event(event) {
                        announce_time(runner);
                    }
                    continue;
                }
            };

            match input {
                Input::Quit => {
                    runner.exit();
                    println!("Session abandoned.");
                    runner.flush_telemetry().await;
                    return Ok(());
                }
                Input::Line(line) => redraw = handle_line(runner, phase, &line),
            }
        }

        if runner.state() == RunnerState::Terminal(TerminalReason::TimeExpired) {
            println!();
            println!("Time is up.");
        }
        if let Some(summary) = runner.summary() {
            render_summary(&summary);
        }
        runner.flush_telemetry().await;

        self.collect_feedback(runner).await?;
        runner.exit();
        Ok(())
    }

    async fn collect_feedback(&mut self, runner: &mut SessionRunner) -> Result<(), Box<dyn Error>> {
        println!();
        println!("How was this session? Rate 1-5 (Enter for 5, 'quit' to skip):");
        loop {
            let Input::Line(line) = self.read_line().await? else {
                return Ok(());
            };
            let line = line.trim();
            if line.is_empty() {
                break;
            }
            match line.parse::<u8>() {
                Ok(rating) => match runner.feedback_form_mut().set_rating(rating) {
                    Ok(()) => break,
                    Err(err) => println!("{err}"),
                },
                Err(_) => println!("Enter a number from 1 to 5."),
            }
        }

        println!("Any comments? (optional)");
        let Input::Line(text) = self.read_line().await? else {
            return Ok(());
        };
        runner.feedback_form_mut().set_text(text);

        loop {
            match runner.submit_feedback().await {
                Ok(()) => {
                    println!("Thanks for the feedback!");
                    return Ok(());
                }
                Err(err) => {
                    println!("{err}");
                    println!("Retry? [y/N]");
                    match self.read_line().await? {
                        Input::Line(answer) if answer.trim().eq_ignore_ascii_case("y") => {}
                        _ => return Ok(()),
                    }
                }
            }
        }
    }
}

// Returns whether the screen needs a redraw.
fn handle_line(runner: &mut SessionRunner, phase: ItemPhase, line: &str) -> bool {
    if phase == ItemPhase::Answered {
        return report(runner.next().map(|_| ()));
    }
    let Some(item) = runner.current_item() else {
        return false;
    };

    match item.kind() {
        ItemKind::MatchPairs => handle_match_line(runner, line),
        ItemKind::SingleChoice | ItemKind::TrueFalse => {
            let submission = choice_submission(item, line);
            submit(runner, submission)
        }
        ItemKind::Cloze | ItemKind::Unsupported => submit(runner, Submission::choice(line)),
    }
}

// A number picks the listed option; anything else is taken verbatim.
fn choice_submission(item: &Item, line: &str) -> Submission {
    let picked = line
        .trim()
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|idx| item.choices().get(idx));
    match picked {
        Some(choice) => Submission::choice(choice.clone()),
        None => Submission::choice(line),
    }
}

fn handle_match_line(runner: &mut SessionRunner, line: &str) -> bool {
    let Some(board) = runner.match_board_mut() else {
        return submit(runner, Submission::mapping(Vec::<(String, String)>::new()));
    };
    let mut words = line.split_whitespace();
    match (words.next(), words.next()) {
        (Some("done"), None) => {
            if !board.is_complete() {
                println!("Assign every item before submitting.");
                return false;
            }
            let submission = board.submission();
            submit(runner, submission)
        }
        (Some("clear"), Some(n)) => {
            if let Some(left) = left_at(board, n) {
                board.clear(&left);
            }
            true
        }
        (Some(n), Some(label)) => {
            let (Some(left), Some(right)) = (left_at(board, n), right_at(board, label)) else {
                println!("Use '<number> <letter>', 'clear <number>' or 'done'.");
                return false;
            };
            if let Err(err) = board.assign(&left, &right) {
                println!("{err}");
                return false;
            }
            true
        }
        _ => {
            println!("Use '<number> <letter>', 'clear <number>' or 'done'.");
            false
        }
    }
}

fn left_at(board: &MatchBoard, raw: &str) -> Option<String> {
    let idx = raw.parse::<usize>().ok()?.checked_sub(1)?;
    board.lefts().get(idx).cloned()
}

fn right_at(board: &MatchBoard, raw: &str) -> Option<String> {
    let mut chars = raw.chars();
    let (Some(c), None) = (chars.next(), chars.next()) else {
        return None;
    };
    let idx = usize::try_from(u32::from(c.to_ascii_lowercase()).checked_sub(u32::from('a'))?).ok()?;
    board.rights().get(idx).cloned()
}

fn letter(idx: usize) -> char {
    u32::try_from(idx)
        .ok()
        .and_then(|i| char::from_u32(u32::from('a') + i))
        .unwrap_or('?')
}

fn submit(runner: &mut SessionRunner, submission: Submission) -> bool {
    match runner.submit(submission) {
        Ok(Some(outcome)) => {
            println!("{}", outcome.feedback.message());
            true
        }
        Ok(None) => false,
        Err(RunnerError::MalformedItem(err)) => {
            println!("This item cannot be answered: {err}. Type 'quit' to leave.");
            false
        }
        Err(err) => report(Err(err)),
    }
}

fn report(result: Result<(), RunnerError>) -> bool {
    match result {
        Ok(()) => true,
        Err(err) => {
            println!("{err}");
            false
        }
    }
}

fn announce_time(runner: &SessionRunner) {
    let Some(secs) = runner.remaining_secs() else {
        return;
    };
    if secs > 0 && (secs <= FINAL_SECONDS || secs % 60 == 0) {
        println!("  [{} left]", format_clock(secs));
    }
}

fn render(runner: &SessionRunner, phase: ItemPhase) {
    if phase == ItemPhase::Answered {
        println!("Press Enter to continue.");
        return;
    }
    let (Some(item), Some(progress)) = (runner.current_item(), runner.progress()) else {
        return;
    };

    println!();
    match progress.remaining_secs {
        Some(secs) => println!(
            "Question {}/{}  (score {}, {} left)",
            progress.position,
            progress.total,
            progress.score,
            format_clock(secs)
        ),
        None => println!(
            "Question {}/{}  (score {})",
            progress.position, progress.total, progress.score
        ),
    }
    println!("{}", item.stem());

    if let Err(err) = item.validate_payload() {
        println!("This item cannot be answered: {err}. Type 'quit' to leave.");
        return;
    }
    match item.kind() {
        ItemKind::SingleChoice | ItemKind::TrueFalse => {
            for (idx, choice) in item.choices().iter().enumerate() {
                println!("  {}. {choice}", idx + 1);
            }
            println!("Answer with a number:");
        }
        ItemKind::MatchPairs => {
            if let Some(board) = runner.match_board() {
                render_board(board);
            }
        }
        ItemKind::Cloze => println!("Type your answer:"),
        ItemKind::Unsupported => {}
    }
}

fn render_board(board: &MatchBoard) {
    for (idx, left) in board.lefts().iter().enumerate() {
        match board.assigned(left) {
            Some(right) => println!("  {}. {left} → {right}", idx + 1),
            None => {
                let open: Vec<String> = board
                    .available_for(left)
                    .into_iter()
                    .filter_map(|right| {
                        let pos = board.rights().iter().position(|r| r == right)?;
                        Some(letter(pos).to_string())
                    })
                    .collect();
                println!("  {}. {left} → ?  [{}]", idx + 1, open.join(" "));
            }
        }
    }
    for (idx, right) in board.rights().iter().enumerate() {
        println!("     {}) {right}", letter(idx));
    }
    println!("Assign with '<number> <letter>', then 'done'.");
}

fn render_summary(summary: &SessionSummary) {
    println!();
    println!("Score: {}/{}", summary.score, summary.total);
    for row in &summary.rows {
        let marker = match row.status {
            AnswerStatus::Correct => "✓",
            AnswerStatus::Incorrect => "✗",
            AnswerStatus::Unanswered => "-",
        };
        println!("{marker} {}. {}", row.position, row.stem);
        match (&row.submitted, row.status) {
            (Some(submitted), AnswerStatus::Incorrect) => {
                println!("    your answer: {submitted}");
                println!("    correct:     {}", row.canonical);
            }
            (None, _) => println!("    {} (correct: {})", row.status.label(), row.canonical),
            _ => {}
        }
    }
}
