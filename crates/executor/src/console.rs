use anyhow::{Context, bail};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use common::config::ThresholdsHandle;
use common::models::Signal;
use common::models::whale::group_thousands;
use registry::{Filter, SearchOutcome, SearchResolver, SignalRegistry, WhaleDetector};

const HELP: &str = "\
commands:
  search <symbol>     track and select a symbol
  select <id|symbol>  select a tracked signal
  filter <name>       ALL, CRYPTO, KR, GLOBAL or WHALE
  list                show signals under the current filter
  whales              show recent whale alerts
  threshold <usd>     set the whale threshold
  help
  quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Search(String),
    Select(String),
    Filter(Filter),
    List,
    Whales,
    Threshold(f64),
    Help,
    Quit,
}

/// `Ok(None)` for a blank line.
pub fn parse_command(line: &str) -> anyhow::Result<Option<Command>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (verb, arg) = match line.split_once(char::is_whitespace) {
        Some((verb, arg)) => (verb, arg.trim()),
        None => (line, ""),
    };

    let command = match (verb.to_lowercase().as_str(), arg) {
        ("search" | "s", "") => bail!("usage: search <symbol>"),
        ("search" | "s", query) => Command::Search(query.to_string()),
        ("select", "") => bail!("usage: select <id|symbol>"),
        ("select", target) => Command::Select(target.to_string()),
        ("filter" | "f", "") => bail!("usage: filter <ALL|CRYPTO|KR|GLOBAL|WHALE>"),
        ("filter" | "f", name) => Command::Filter(name.parse()?),
        ("list" | "ls", _) => Command::List,
        ("whales" | "w", _) => Command::Whales,
        ("threshold", raw) => Command::Threshold(
            raw.replace(',', "")
                .parse()
                .with_context(|| format!("not a dollar amount: {:?}", raw))?,
        ),
        ("help" | "?", _) => Command::Help,
        ("quit" | "exit" | "q", _) => Command::Quit,
        (other, _) => bail!("unknown command {:?}, try help", other),
    };
    Ok(Some(command))
}

/// Line-oriented operator console over the shared registry.
pub struct Console {
    registry: SignalRegistry,
    detector: WhaleDetector,
    resolver: SearchResolver,
    thresholds: ThresholdsHandle,
    filter: Filter,
}

impl Console {
    pub fn new(
        registry: SignalRegistry,
        detector: WhaleDetector,
        resolver: SearchResolver,
        thresholds: ThresholdsHandle,
    ) -> Self {
        Self {
            registry,
            detector,
            resolver,
            thresholds,
            filter: Filter::default(),
        }
    }

    /// Reads lines until `quit`, end of input, or the input channel closes.
    pub async fn run(&mut self, mut lines_rx: mpsc::Receiver<String>) {
        println!("{}", HELP);

        while let Some(line) = lines_rx.recv().await {
            let command = match parse_command(&line) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(e) => {
                    println!("{:#}", e);
                    continue;
                }
            };

            if command == Command::Quit {
                break;
            }

            match self.execute(command).await {
                Ok(output) => println!("{}", output),
                Err(e) => {
                    warn!("Command failed: {:#}", e);
                    println!("error: {:#}", e);
                }
            }
        }
        debug!("Console closed");
    }

    pub async fn execute(&mut self, command: Command) -> anyhow::Result<String> {
        match command {
            Command::Search(query) => {
                let outcome = self.resolver.insert_from_search(&query).await?;
                let signal = outcome.signal();
                Ok(match &outcome {
                    SearchOutcome::Existing(_) => format!("Selected {}", signal.symbol),
                    SearchOutcome::Inserted(_) => format!(
                        "Added {} ({}) at {:.2}",
                        signal.symbol,
                        signal.market.as_str(),
                        signal.price
                    ),
                    SearchOutcome::Degraded(_) => {
                        format!("Added {} without price data", signal.symbol)
                    }
                })
            }
            Command::Select(target) => {
                let Some(signal) = self.registry.find(&target).await else {
                    bail!("{} is not tracked, use search to add it", target);
                };
                self.registry.select(&signal.id).await;
                Ok(format!("Selected {}", signal.symbol))
            }
            Command::Filter(filter) => {
                self.filter = filter;
                self.list().await
            }
            Command::List => self.list().await,
            Command::Whales => {
                let alerts = self.detector.alerts().await;
                if alerts.is_empty() {
                    return Ok("No whale alerts yet".to_string());
                }
                Ok(alerts
                    .iter()
                    .map(|a| {
                        format!(
                            "{} {:<10} {:<4} ${:>14}  {}",
                            a.timestamp.format("%H:%M:%S"),
                            a.symbol,
                            a.side.as_str(),
                            group_thousands(a.amount_usd.floor()),
                            a.description
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n"))
            }
            Command::Threshold(whale_usd) => {
                if self.thresholds.set_whale_usd(whale_usd)? {
                    Ok(format!("Whale threshold set to ${}", group_thousands(whale_usd)))
                } else {
                    Ok("Whale threshold unchanged".to_string())
                }
            }
            Command::Help => Ok(HELP.to_string()),
            Command::Quit => Ok(String::new()),
        }
    }

    async fn list(&self) -> anyhow::Result<String> {
        let selected_id = self.registry.selected_id().await;
        let signals = self.registry.view(self.filter).await;

        let mut out = format!("[{}] {} signals", self.filter, signals.len());
        for signal in &signals {
            out.push('\n');
            out.push_str(&render_row(signal, selected_id.as_deref() == Some(signal.id.as_str())));
        }
        Ok(out)
    }
}

fn render_row(signal: &Signal, selected: bool) -> String {
    format!(
        "{} {:<12} {:<6} {:>14.2} {:>+7.2}%  score {:>5.1}  whales {:>2}  {}",
        if selected { '*' } else { ' ' },
        signal.symbol,
        signal.market.as_str(),
        signal.price,
        signal.change_rate,
        signal.score,
        signal.whale_signals.len(),
        signal.reasons.join("; ")
    )
}
