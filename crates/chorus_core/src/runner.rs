//! Response cycles: walk the turn order and let each persona speak or pass
//!
//! Personas are handled strictly one after another. Each one re-reads the
//! channel first, so it sees whatever the personas before it just said.
//! Cancellation is honored at the history read, the directory lookup, the
//! generation call and the pacing pause. A send that has started always runs
//! to completion and records its cooldown before the next check.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::channel::ChatChannel;
use crate::config::{GenerationErrorPolicy, SchedulerConfig};
use crate::directory::MentionDirectory;
use crate::llm::{Generator, Reply};
use crate::message::{ChatMessage, clean_response, format_persona_message};
use crate::persona::Persona;
use crate::scheduler::{CycleHandler, Trigger};
use crate::state::SchedulerState;
use crate::turn::{mentioned_names, select_order};

#[derive(Debug, Clone, PartialEq)]
pub struct RunnerSettings {
    pub cooldown: Duration,
    pub pacing: Duration,
    pub history_limit: usize,
    pub on_generation_error: GenerationErrorPolicy,
}

impl From<&SchedulerConfig> for RunnerSettings {
    fn from(config: &SchedulerConfig) -> Self {
        Self {
            cooldown: config.cooldown(),
            pacing: config.pacing(),
            history_limit: config.history_limit,
            on_generation_error: config.on_generation_error,
        }
    }
}

/// What happened to each persona in one cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Personas whose message reached the channel, in send order
    pub spoke: Vec<String>,
    /// Personas that chose not to speak
    pub silent: Vec<String>,
    /// Personas passed over (cooldown or nothing to read)
    pub skipped: Vec<String>,
    /// Personas whose history read, generation or send failed
    pub failed: Vec<String>,
    /// Whether a newer trigger cut the cycle short
    pub cancelled: bool,
}

/// Await `fut` unless `cancel` fires first
async fn until_cancelled<F: Future>(cancel: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        out = fut => Some(out),
    }
}

pub struct CycleRunner {
    channel: Arc<dyn ChatChannel>,
    generator: Arc<dyn Generator>,
    state: Arc<SchedulerState>,
    settings: RunnerSettings,
}

impl CycleRunner {
    pub fn new(
        channel: Arc<dyn ChatChannel>,
        generator: Arc<dyn Generator>,
        state: Arc<SchedulerState>,
        settings: RunnerSettings,
    ) -> Self {
        Self {
            channel,
            generator,
            state,
            settings,
        }
    }

    pub fn state(&self) -> &Arc<SchedulerState> {
        &self.state
    }

    /// Give every persona in `order` its chance to respond.
    ///
    /// The persona named `trigger_author` is never asked to answer its own
    /// message.
    pub async fn run_cycle(
        &self,
        order: Vec<Persona>,
        trigger_author: &str,
        cancel: &CancellationToken,
    ) -> CycleReport {
        let mut report = CycleReport::default();
        let names: Vec<String> = order.iter().map(|p| p.name().to_string()).collect();
        let header_names: Vec<&str> = names.iter().map(String::as_str).collect();
        let mut directory: Option<MentionDirectory> = None;

        for mut persona in order {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let name = persona.name().to_string();
            if name == trigger_author {
                continue;
            }

            if !self
                .state
                .is_ready(&name, self.settings.cooldown, Instant::now())
            {
                debug!("{}: still cooling down", name);
                report.skipped.push(name);
                continue;
            }

            let history = match until_cancelled(
                cancel,
                self.channel.read_recent(self.settings.history_limit),
            )
            .await
            {
                None => {
                    report.cancelled = true;
                    break;
                }
                Some(Ok(history)) => history,
                Some(Err(e)) => {
                    warn!("{}: could not read channel history: {}", name, e);
                    report.failed.push(name);
                    continue;
                }
            };

            if history.is_empty() {
                debug!("{}: no context", name);
                report.skipped.push(name);
                continue;
            }

            if directory.is_none() {
                match until_cancelled(cancel, self.channel.directory()).await {
                    None => {
                        report.cancelled = true;
                        break;
                    }
                    Some(Ok(fetched)) => directory = Some(fetched),
                    Some(Err(e)) => {
                        warn!("Mention directory unavailable, sending tokens as written: {}", e);
                        directory = Some(MentionDirectory::default());
                    }
                }
            }
            let directory = &*directory.get_or_insert_with(MentionDirectory::default);

            persona.observe(
                history
                    .into_iter()
                    .map(|msg| ChatMessage::new(msg.author, directory.humanize(&msg.content)))
                    .collect(),
            );

            let text = match until_cancelled(cancel, self.generator.decide_and_generate(&persona))
                .await
            {
                None => {
                    report.cancelled = true;
                    break;
                }
                Some(Ok(Reply::Responded(text))) => clean_response(&text, &header_names),
                Some(Ok(Reply::Silent)) => String::new(),
                Some(Err(e)) => {
                    warn!("{}: generation failed: {}", name, e);
                    report.failed.push(name);
                    match self.settings.on_generation_error {
                        GenerationErrorPolicy::Skip => continue,
                        GenerationErrorPolicy::Abort => break,
                    }
                }
            };

            if text.is_empty() {
                info!("{}: intent no", name);
                report.silent.push(name);
                continue;
            }

            info!("{}: responding", name);
            let outgoing = format_persona_message(&name, &directory.resolve(&text));
            if let Err(e) = self.channel.send(&outgoing).await {
                warn!("{}: send failed: {}", name, e);
                report.failed.push(name);
                continue;
            }
            self.state.record_send(&name, Instant::now());
            report.spoke.push(name);

            if until_cancelled(cancel, tokio::time::sleep(self.settings.pacing))
                .await
                .is_none()
            {
                report.cancelled = true;
                break;
            }
        }

        report
    }
}

#[async_trait]
impl CycleHandler for CycleRunner {
    async fn run(&self, trigger: Trigger, cancel: CancellationToken) {
        let personas = self.state.snapshot();
        let order: Vec<Persona> = {
            let names: Vec<String> = personas.iter().map(|p| p.name().to_string()).collect();
            let mentioned = mentioned_names(&trigger.content, &names);
            let mut rng = rand::rng();
            select_order(&personas, &trigger.author, &mentioned, &mut rng)
                .into_iter()
                .cloned()
                .collect()
        };

        let report = self.run_cycle(order, &trigger.author, &cancel).await;
        if report.cancelled {
            debug!("Cycle superseded after {:?} spoke", report.spoke);
        } else {
            debug!(
                "Cycle done: spoke {:?}, silent {:?}, skipped {:?}, failed {:?}",
                report.spoke, report.silent, report.skipped, report.failed
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockGenerator;
    use crate::roster::Roster;
    use crate::{CoreError, Result};
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    /// In-memory channel: sends are appended to the history
    #[derive(Default)]
    struct FakeChannel {
        history: Mutex<Vec<ChatMessage>>,
        sent: Mutex<Vec<String>>,
        fail_sends: Mutex<bool>,
        directory: MentionDirectory,
    }

    impl FakeChannel {
        fn with_history(messages: &[(&str, &str)]) -> Self {
            Self {
                history: Mutex::new(
                    messages
                        .iter()
                        .map(|(a, c)| ChatMessage::new(*a, *c))
                        .collect(),
                ),
                ..Self::default()
            }
        }

        fn sent(&self) -> Vec<String> {
            self.sent.lock().clone()
        }
    }

    #[async_trait]
    impl ChatChannel for FakeChannel {
        async fn read_recent(&self, limit: usize) -> Result<Vec<ChatMessage>> {
            let history = self.history.lock();
            let start = history.len().saturating_sub(limit);
            Ok(history[start..].to_vec())
        }

        async fn send(&self, text: &str) -> Result<()> {
            if *self.fail_sends.lock() {
                return Err(CoreError::channel(
                    "send",
                    std::io::Error::other("rate limited"),
                ));
            }
            self.sent.lock().push(text.to_string());
            self.history
                .lock()
                .push(ChatMessage::from_platform("chorus", text));
            Ok(())
        }

        async fn directory(&self) -> Result<MentionDirectory> {
            Ok(self.directory.clone())
        }
    }

    /// Generator with a scripted reply per persona
    struct ScriptedGenerator {
        replies: HashMap<String, Reply>,
        seen: Mutex<Vec<(String, usize)>>,
    }

    impl ScriptedGenerator {
        fn new(replies: &[(&str, Reply)]) -> Self {
            Self {
                replies: replies
                    .iter()
                    .map(|(n, r)| (n.to_string(), r.clone()))
                    .collect(),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Generator for ScriptedGenerator {
        async fn decide_and_generate(&self, persona: &Persona) -> Result<Reply> {
            self.seen
                .lock()
                .push((persona.name().to_string(), persona.messages().len()));
            Ok(self
                .replies
                .get(persona.name())
                .cloned()
                .unwrap_or(Reply::Silent))
        }
    }

    fn settings() -> RunnerSettings {
        RunnerSettings {
            cooldown: Duration::from_secs(10),
            pacing: Duration::from_secs(2),
            history_limit: 20,
            on_generation_error: GenerationErrorPolicy::Skip,
        }
    }

    fn personas(names: &[&str]) -> Vec<Persona> {
        names.iter().map(|n| Persona::new(*n, "")).collect()
    }

    fn build_runner(
        channel: Arc<FakeChannel>,
        generator: Arc<dyn Generator>,
        names: &[&str],
    ) -> CycleRunner {
        let state = Arc::new(SchedulerState::new(Roster::new(personas(names))));
        CycleRunner::new(channel, generator, state, settings())
    }

    fn said(text: &str) -> Reply {
        Reply::Responded(text.to_string())
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycle_sends_in_order_and_skips_author() {
        let channel = Arc::new(FakeChannel::with_history(&[("mira", "hi all")]));
        let generator = Arc::new(ScriptedGenerator::new(&[
            ("adobo", said("adobo: hey mira")),
            ("bingus", said("yo")),
            ("kingus", said("should not be asked")),
        ]));
        let runner = build_runner(channel.clone(), generator.clone(), &["adobo", "bingus", "kingus"]);

        let report = runner
            .run_cycle(
                personas(&["bingus", "kingus", "adobo"]),
                "kingus",
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(report.spoke, vec!["bingus", "adobo"]);
        assert_eq!(
            channel.sent(),
            vec!["**bingus**: yo", "**adobo**: hey mira"]
        );
        // adobo saw bingus's fresh message
        assert_eq!(
            *generator.seen.lock(),
            vec![("bingus".to_string(), 1), ("adobo".to_string(), 2)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_skips_recent_speaker() {
        let channel = Arc::new(FakeChannel::with_history(&[("mira", "hi")]));
        let generator = Arc::new(ScriptedGenerator::new(&[
            ("adobo", said("a")),
            ("bingus", said("b")),
        ]));
        let runner = build_runner(channel.clone(), generator, &["adobo", "bingus"]);

        // bingus spoke 3 seconds ago
        runner.state().record_send("bingus", Instant::now());
        tokio::time::advance(Duration::from_secs(3)).await;

        let report = runner
            .run_cycle(
                personas(&["bingus", "adobo"]),
                "mira",
                &CancellationToken::new(),
            )
            .await;
        assert_eq!(report.skipped, vec!["bingus"]);
        assert_eq!(report.spoke, vec!["adobo"]);

        // eligible again once the full interval has passed
        tokio::time::advance(Duration::from_secs(7)).await;
        let report = runner
            .run_cycle(personas(&["bingus"]), "mira", &CancellationToken::new())
            .await;
        assert_eq!(report.spoke, vec!["bingus"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_and_empty_history() {
        let channel = Arc::new(FakeChannel::default());
        let generator = Arc::new(ScriptedGenerator::new(&[("adobo", said("hello?"))]));
        let runner = build_runner(channel.clone(), generator, &["adobo"]);

        let report = runner
            .run_cycle(personas(&["adobo"]), "mira", &CancellationToken::new())
            .await;
        assert_eq!(report.skipped, vec!["adobo"]);
        assert!(channel.sent().is_empty());

        channel.history.lock().push(ChatMessage::new("mira", "hm"));
        let generator = Arc::new(ScriptedGenerator::new(&[]));
        let runner = build_runner(channel.clone(), generator, &["adobo"]);
        let report = runner
            .run_cycle(personas(&["adobo"]), "mira", &CancellationToken::new())
            .await;
        assert_eq!(report.silent, vec!["adobo"]);
        assert!(channel.sent().is_empty());
        assert_eq!(runner.state().last_sent("adobo"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_generation_error_skips_persona() {
        let channel = Arc::new(FakeChannel::with_history(&[("mira", "hi")]));
        let mut generator = MockGenerator::new();
        generator
            .expect_decide_and_generate()
            .times(2)
            .returning(|persona| {
                if persona.name() == "adobo" {
                    Err(CoreError::ProviderErrorResponse {
                        provider: "anthropic".to_string(),
                        status: 529,
                        body: "overloaded".to_string(),
                    })
                } else {
                    Ok(Reply::Responded("still here".to_string()))
                }
            });
        let runner = build_runner(channel.clone(), Arc::new(generator), &["adobo", "bingus"]);

        let report = runner
            .run_cycle(
                personas(&["adobo", "bingus"]),
                "mira",
                &CancellationToken::new(),
            )
            .await;
        assert_eq!(report.failed, vec!["adobo"]);
        assert_eq!(report.spoke, vec!["bingus"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_generation_error_aborts_with_strict_policy() {
        let channel = Arc::new(FakeChannel::with_history(&[("mira", "hi")]));
        let mut generator = MockGenerator::new();
        generator
            .expect_decide_and_generate()
            .times(1)
            .returning(|_| {
                Err(CoreError::ProviderEmptyResponse {
                    provider: "openai".to_string(),
                    model: "gpt-4o".to_string(),
                })
            });
        let state = Arc::new(SchedulerState::new(Roster::new(personas(&["adobo", "bingus"]))));
        let runner = CycleRunner::new(
            channel.clone(),
            Arc::new(generator),
            state,
            RunnerSettings {
                on_generation_error: GenerationErrorPolicy::Abort,
                ..settings()
            },
        );

        let report = runner
            .run_cycle(
                personas(&["adobo", "bingus"]),
                "mira",
                &CancellationToken::new(),
            )
            .await;
        assert_eq!(report.failed, vec!["adobo"]);
        assert!(report.spoke.is_empty());
        assert!(!report.cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_send_leaves_cooldown_untouched() {
        let channel = Arc::new(FakeChannel::with_history(&[("mira", "hi")]));
        *channel.fail_sends.lock() = true;
        let generator = Arc::new(ScriptedGenerator::new(&[
            ("adobo", said("a")),
            ("bingus", said("b")),
        ]));
        let runner = build_runner(channel.clone(), generator, &["adobo", "bingus"]);

        let report = runner
            .run_cycle(
                personas(&["adobo", "bingus"]),
                "mira",
                &CancellationToken::new(),
            )
            .await;
        assert_eq!(report.failed, vec!["adobo", "bingus"]);
        assert_eq!(runner.state().last_sent("adobo"), None);
        assert_eq!(runner.state().last_sent("bingus"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mentions_resolved_and_history_humanized() {
        let mut directory = MentionDirectory::new();
        directory.add_user("mira", 111);
        directory.add_emoji("pog", 900, false);
        let channel = Arc::new(FakeChannel {
            directory,
            ..FakeChannel::with_history(&[("mira", "<@111> look <:pog:900>")])
        });

        struct Echo;

        #[async_trait]
        impl Generator for Echo {
            async fn decide_and_generate(&self, persona: &Persona) -> Result<Reply> {
                Ok(Reply::Responded(persona.messages()[0].content.clone()))
            }
        }

        let runner = build_runner(channel.clone(), Arc::new(Echo), &["adobo"]);
        runner
            .run_cycle(personas(&["adobo"]), "mira", &CancellationToken::new())
            .await;

        // the persona read "@mira look :pog:" and the send went out resolved
        assert_eq!(channel.sent(), vec!["**adobo**: <@111> look <:pog:900>"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_pacing_stops_cycle() {
        let channel = Arc::new(FakeChannel::with_history(&[("mira", "hi")]));
        let generator = Arc::new(ScriptedGenerator::new(&[
            ("a", said("one")),
            ("b", said("two")),
            ("c", said("three")),
        ]));
        let runner = Arc::new(build_runner(channel.clone(), generator.clone(), &["a", "b", "c"]));
        let cancel = CancellationToken::new();

        let task = {
            let runner = runner.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                runner
                    .run_cycle(personas(&["a", "b", "c"]), "mira", &cancel)
                    .await
            })
        };

        // a has sent and is in its pacing pause; a new message arrives
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(channel.sent(), vec!["**a**: one"]);
        cancel.cancel();

        let report = task.await.unwrap();
        assert!(report.cancelled);
        assert_eq!(report.spoke, vec!["a"]);
        assert_eq!(generator.seen.lock().len(), 1);
        assert!(runner.state().last_sent("b").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_start_does_nothing() {
        let channel = Arc::new(FakeChannel::with_history(&[("mira", "hi")]));
        let generator = Arc::new(ScriptedGenerator::new(&[("a", said("one"))]));
        let runner = build_runner(channel.clone(), generator, &["a"]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = runner.run_cycle(personas(&["a"]), "mira", &cancel).await;
        assert!(report.cancelled);
        assert!(channel.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_message_mid_cycle_restarts_with_fresh_history() {
        use crate::scheduler::DebounceScheduler;

        let channel = Arc::new(FakeChannel::with_history(&[("mira", "hi all")]));
        let generator = Arc::new(ScriptedGenerator::new(&[
            ("a", said("one")),
            ("b", said("two")),
            ("c", said("three")),
        ]));
        let runner = Arc::new(build_runner(channel.clone(), generator.clone(), &["a", "b", "c"]));
        let scheduler = DebounceScheduler::new(runner, Duration::from_secs(10));

        scheduler.trigger(Trigger::new("mira", "hi all"));
        // first persona has sent and is pacing
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(channel.sent().len(), 1);

        channel.history.lock().push(ChatMessage::new("mira", "wait, one more thing"));
        scheduler.trigger(Trigger::new("mira", "wait, one more thing"));
        tokio::time::sleep(Duration::from_secs(60)).await;

        // cycle 1 never reached its second persona; cycle 2 ran everyone
        let seen = generator.seen.lock().clone();
        assert_eq!(seen.len(), 4);
        assert_eq!(channel.sent().len(), 4);
        assert_eq!(seen[1].1, 3);
        assert!(scheduler.is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn test_handler_puts_mentioned_persona_first() {
        let channel = Arc::new(FakeChannel::with_history(&[("mira", "@kingus you there?")]));
        let generator = Arc::new(ScriptedGenerator::new(&[
            ("adobo", said("a")),
            ("bingus", said("b")),
            ("kingus", said("k")),
        ]));
        let runner = build_runner(channel.clone(), generator, &["adobo", "bingus", "kingus"]);

        runner
            .run(
                Trigger::new("mira", "@kingus you there?"),
                CancellationToken::new(),
            )
            .await;

        let sent = channel.sent();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0], "**kingus**: k");
    }
}
