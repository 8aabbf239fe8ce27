//! Interactive guided authoring loop.
//!
//! Plain lines are sent as messages; slash commands navigate:
//! `/next`, `/prev`, `/step N`, `/quit`. Streamed output from the claude
//! process is printed as it arrives via the runner's sink.

use std::io::Write as _;

use atelier_core::{Database, GuideOrchestrator, GuideState, GuideStep, WorkStatus};
use claude_runner::{ClaudeRunner, StreamEvent};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

pub async fn run(
    db: &Database,
    work_id: i64,
    claude: Option<String>,
    timeout_secs: Option<u64>,
) -> anyhow::Result<()> {
    let mut runner = match claude {
        Some(exe) => ClaudeRunner::with_executable(exe),
        None => ClaudeRunner::new(),
    };
    if let Some(secs) = timeout_secs {
        runner.set_timeout(std::time::Duration::from_secs(secs));
    }
    let (tx, mut rx) = mpsc::unbounded_channel();
    runner.register_sink(tx);
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                StreamEvent::Stdout(line) => println!("{line}"),
                StreamEvent::Stderr(line) => eprintln!("{line}"),
            }
        }
    });

    // Entering the guide is what moves a fresh work out of draft; the
    // orchestrator itself never writes the work row.
    if let Some(work) = db.works().get(work_id)? {
        if work.status == WorkStatus::Draft {
            db.works().update_status(work_id, WorkStatus::InProgress)?;
        }
    }

    let mut orch = GuideOrchestrator::new(db, runner);
    orch.init_guide(work_id).await;
    if let Some(err) = &orch.state().error {
        anyhow::bail!("could not start guide: {err}");
    }
    if !orch.state().runner_available {
        eprintln!("warning: claude executable not found; messages will fail");
    }
    banner(orch.state());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("[step {}] > ", orch.state().current_step.number());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        match line {
            "" => {}
            "/quit" => break,
            "/next" => {
                if orch.state().can_advance() {
                    orch.next_step().await?;
                } else {
                    eprintln!("get an assistant response before moving on");
                }
            }
            "/prev" => orch.prev_step().await?,
            _ if line.starts_with("/step") => {
                let step = line
                    .strip_prefix("/step")
                    .and_then(|rest| rest.trim().parse::<u8>().ok())
                    .and_then(GuideStep::from_number);
                match step {
                    Some(step) => orch.go_to_step(step).await?,
                    None => eprintln!("usage: /step <1-5>"),
                }
            }
            _ if line.starts_with('/') => {
                eprintln!("commands: /next /prev /step N /quit");
            }
            message => {
                orch.send_message(message).await;
                if let Some(err) = &orch.state().error {
                    eprintln!("turn failed: {err}");
                }
            }
        }
    }

    printer.abort();
    Ok(())
}

fn banner(state: &GuideState) {
    if let Some(work) = &state.work {
        println!("guiding '{}' ({})", work.name, work.work_type);
    }
    if let Some(pattern) = &state.base_pattern {
        println!("based on pattern '{}'", pattern.name);
    }
    if !state.messages.is_empty() {
        println!("resuming with {} earlier message(s)", state.messages.len());
    }
}
