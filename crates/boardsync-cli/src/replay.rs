//! Transcript replay
//!
//! A transcript is a JSON-lines file of [`DriverInput`]s. Blank lines and
//! lines starting with `#` are skipped. Replaying feeds every input to a
//! freshly started runtime, drains its outputs, and reports the final state.

use std::fmt::Write as _;
use std::io::BufRead;

use anyhow::{anyhow, Context, Result};
use tracing::{debug, warn};

use boardsync_core::{AppEvent, BoardEditor, ClientConfig, Effect, GameClient};
use boardsync_runtime::{DriverInput, RuntimeBuilder};

use crate::config::OutputConfig;

/// Everything a replay produced
#[derive(Debug)]
pub struct ReplayReport {
    pub effects: Vec<Effect>,
    pub events: Vec<AppEvent>,
    pub client: GameClient,
    /// Inputs the driver accepted before it stopped
    pub inputs_delivered: usize,
}

pub fn read_transcript<R: BufRead>(reader: R) -> Result<Vec<DriverInput>> {
    let mut inputs = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {}", index + 1))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let input = serde_json::from_str(line)
            .with_context(|| format!("Invalid input on line {}", index + 1))?;
        inputs.push(input);
    }
    Ok(inputs)
}

pub async fn run_replay(config: &ClientConfig, inputs: Vec<DriverInput>) -> Result<ReplayReport> {
    let mut handle = RuntimeBuilder::new()
        .with_config(config.clone())
        .build_and_start()?;

    let mut effect_receiver = handle
        .take_effect_receiver()
        .ok_or_else(|| anyhow!("Effect receiver already taken"))?;
    let mut app_event_receiver = handle
        .take_app_event_receiver()
        .ok_or_else(|| anyhow!("App event receiver already taken"))?;

    let effects_task = tokio::spawn(async move {
        let mut effects = Vec::new();
        while let Some(effect) = effect_receiver.recv().await {
            effects.push(effect);
        }
        effects
    });
    let events_task = tokio::spawn(async move {
        let mut events = Vec::new();
        while let Some(event) = app_event_receiver.recv().await {
            events.push(event);
        }
        events
    });

    let total = inputs.len();
    let mut inputs_delivered = 0;
    for input in inputs {
        if let Err(e) = handle.send(input).await {
            warn!("Driver stopped after {} of {} inputs: {}", inputs_delivered, total, e);
            break;
        }
        inputs_delivered += 1;
    }
    debug!(inputs_delivered, "Transcript delivered");

    let client = handle.shutdown().await?;
    let effects = effects_task.await?;
    let events = events_task.await?;

    Ok(ReplayReport {
        effects,
        events,
        client,
        inputs_delivered,
    })
}

/// Human-readable summary of a replay
pub fn render_report(report: &ReplayReport, output: &OutputConfig) -> Result<String> {
    let mut text = String::new();

    if output.show_effects {
        writeln!(text, "== effects ({}) ==", report.effects.len())?;
        for effect in &report.effects {
            writeln!(text, "{}", serde_json::to_string(effect)?)?;
        }
    }
    if output.show_events {
        writeln!(text, "== events ({}) ==", report.events.len())?;
        for event in &report.events {
            writeln!(text, "{}", serde_json::to_string(event)?)?;
        }
    }
    if output.show_audit {
        writeln!(text, "== audit ==")?;
        for entry in report.client.audit_log() {
            writeln!(
                text,
                "{} {} -> {} on {}",
                entry.timestamp.as_millis(),
                entry.from_state,
                entry.to_state,
                entry.event
            )?;
        }
    }

    writeln!(text, "== session ==")?;
    writeln!(text, "state: {}", report.client.session().state_name())?;

    match report.client.game() {
        Some(game) => {
            let moves: Vec<&str> = game
                .board
                .moves()
                .iter()
                .map(|record| record.compact.as_str())
                .collect();
            writeln!(text, "moves: {}", moves.join(" "))?;
            if let Some(conclusion) = &game.conclusion {
                writeln!(text, "conclusion: {}", conclusion)?;
            }
            writeln!(text, "== board ==")?;
            writeln!(text, "{}", BoardEditor::save_position(&game.board))?;
        }
        None => writeln!(text, "no game loaded")?,
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use boardsync_runtime::LocalCommand;

    #[test]
    fn test_read_transcript_skips_comments() {
        let text = r#"
# join as white
{"input":"server","message":{"sub":"game","action":"joingame","value":{"id":1,"publicity":"public","youAreColor":"white","moves":[],"gameConclusion":false}}}

{"input":"command","command":{"command":"resync"}}
"#;
        let inputs = read_transcript(text.as_bytes()).unwrap();
        assert_eq!(inputs.len(), 2);
        assert_eq!(
            inputs[1],
            DriverInput::Command {
                command: LocalCommand::Resync
            }
        );
    }

    #[test]
    fn test_read_transcript_reports_line() {
        let err = read_transcript("{\"input\":\"shutdown\"}\nnot json\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[tokio::test]
    async fn test_replay_join_and_move() {
        let text = r#"
{"input":"server","message":{"sub":"game","action":"joingame","value":{"id":3,"publicity":"public","youAreColor":"white","metadata":{"Variant":"Classical"},"moves":[],"gameConclusion":false}}}
{"input":"command","command":{"command":"submitMove","compact":"5,2>5,4"}}
{"input":"server","message":{"sub":"game","action":"move","value":{"move":{"compact":"5,7>5,5"},"moveNumber":2,"gameConclusion":false}}}
"#;
        let inputs = read_transcript(text.as_bytes()).unwrap();
        let report = run_replay(&ClientConfig::testing(), inputs).await.unwrap();

        assert_eq!(report.inputs_delivered, 3);
        let moves: Vec<&str> = report
            .client
            .board()
            .unwrap()
            .moves()
            .iter()
            .map(|m| m.compact.as_str())
            .collect();
        assert_eq!(moves, vec!["5,2>5,4", "5,7>5,5"]);
        assert!(report
            .effects
            .iter()
            .any(|e| e.request().map(|r| r.action()) == Some("submitmove")));

        let text = render_report(&report, &OutputConfig::default()).unwrap();
        assert!(text.contains("moves: 5,2>5,4 5,7>5,5"));
    }
}
