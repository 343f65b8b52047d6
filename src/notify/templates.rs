//! Message bodies, rendered with askama from `templates/`.

use askama::Template;

pub const GAME_URL: &str = "http://fasterness.com/game";
pub const REPORT_URL: &str = "http://fasterness.com/speedreport";

/// Sent to the requester once their URL has been tested.
#[derive(Template)]
#[template(path = "completion.txt")]
pub struct CompletionBody<'a> {
    pub site: &'a str,
    pub game_url: &'a str,
    pub report_url: &'a str,
}

impl<'a> CompletionBody<'a> {
    pub fn new(site: &'a str) -> Self {
        Self {
            site,
            game_url: GAME_URL,
            report_url: REPORT_URL,
        }
    }
}

/// Sent to the operator when the daemon exits.
#[derive(Template)]
#[template(path = "operator_exit.txt")]
pub struct OperatorExitBody<'a> {
    pub reason: &'a str,
    pub stats: &'a str,
    pub queue_depth: usize,
}
