//! Crew construction and execution.
//!
//! A `Crew` is the fixed two-agent, two-task pipeline: research the topic,
//! then write the post. Front-end layers only see the `Pipeline` trait; agent
//! roles and task definitions are opaque data owned here. `CrewCache` keeps
//! at most one live crew per parameter tuple and hands the same instance back
//! until it is invalidated.

mod agents;
mod llm;
mod tasks;

use crate::env::ResolvedEnv;
use crate::model::{ProcessMode, RunConfig};
use anyhow::{Context, Result};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use agents::Agent;
use llm::{ChatApi, ChatClient};
use tasks::TaskSpec;

/// Structured input for one kickoff. The topic is the sole field, matching
/// the pipeline's external contract.
#[derive(Debug, Clone)]
pub struct KickoffInputs {
    pub topic: String,
}

/// The seam between the run orchestrator and whatever executes the work.
/// Tests substitute stubs here; production uses `Crew`.
pub trait Pipeline: Send + Sync {
    fn kickoff<'a>(&'a self, inputs: &'a KickoffInputs) -> BoxFuture<'a, Result<String>>;
}

/// Process-wide settings shared by every crew a cache builds.
#[derive(Debug, Clone)]
pub struct CrewSettings {
    pub base_url: String,
    pub request_timeout: Duration,
    pub env: ResolvedEnv,
}

/// The parameter tuple a crew is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CrewKey {
    pub process: ProcessMode,
    pub memory: bool,
    pub cache: bool,
    pub max_rpm: u32,
}

impl From<&RunConfig> for CrewKey {
    fn from(cfg: &RunConfig) -> Self {
        Self {
            process: cfg.process,
            memory: cfg.memory,
            cache: cfg.cache,
            max_rpm: cfg.max_rpm,
        }
    }
}

pub struct Crew {
    process: ProcessMode,
    memory_enabled: bool,
    cache_enabled: bool,
    client: Arc<dyn ChatApi>,
    researcher: Agent,
    writer: Agent,
    manager: Agent,
    research: TaskSpec,
    write: TaskSpec,
    /// Digests of prior runs, appended to agent context when memory is on.
    memory: Mutex<Vec<String>>,
    /// Finished posts by normalized topic, returned without LLM calls when
    /// the cache is on.
    cache: Mutex<HashMap<String, String>>,
}

impl Crew {
    fn build(key: CrewKey, settings: &CrewSettings) -> Result<Self> {
        let api_key = settings
            .env
            .openai_api_key
            .as_deref()
            .context("OPENAI_API_KEY is not set")?;
        let client = ChatClient::new(
            &settings.base_url,
            api_key,
            &settings.env.openai_model,
            key.max_rpm,
            settings.request_timeout,
        )?;
        let channels = settings.env.youtube_channels.as_str();
        let max_results = settings.env.youtube_max_results;
        Ok(Self::new(key, channels, max_results, Arc::new(client)))
    }

    fn new(key: CrewKey, channels: &str, max_results: u32, client: Arc<dyn ChatApi>) -> Self {
        Self {
            process: key.process,
            memory_enabled: key.memory,
            cache_enabled: key.cache,
            client,
            researcher: agents::blog_researcher(channels, max_results),
            writer: agents::blog_writer(),
            manager: agents::crew_manager(),
            research: tasks::research_task(channels, max_results),
            write: tasks::write_task(),
            memory: Mutex::new(Vec::new()),
            cache: Mutex::new(HashMap::new()),
        }
    }

    async fn run(&self, inputs: &KickoffInputs) -> Result<String> {
        let topic = inputs.topic.as_str();
        let cache_key = topic.trim().to_lowercase();

        if self.cache_enabled {
            if let Some(hit) = self.cache.lock().await.get(&cache_key) {
                return Ok(hit.clone());
            }
        }

        let memory_context = if self.memory_enabled {
            let memory = self.memory.lock().await;
            (!memory.is_empty()).then(|| {
                format!(
                    "\n\nNotes from earlier runs of this crew:\n{}",
                    memory.join("\n")
                )
            })
        } else {
            None
        };
        let memory_context = memory_context.unwrap_or_default();

        let research_prompt = format!("{}{}", self.research.render(topic), memory_context);
        let notes = self
            .client
            .chat(&self.researcher.system_prompt(), &research_prompt)
            .await
            .with_context(|| format!("{} task failed", self.research.name))?;

        let write_prompt = format!(
            "{}{}\n\nResearch notes:\n{}",
            self.write.render(topic),
            memory_context,
            notes
        );
        let draft = self
            .client
            .chat(&self.writer.system_prompt(), &write_prompt)
            .await
            .with_context(|| format!("{} task failed", self.write.name))?;

        let post = match self.process {
            ProcessMode::Sequential => draft,
            ProcessMode::Hierarchical => {
                let review_prompt = format!(
                    "Topic: \"{topic}\"\n\nResearcher's notes:\n{notes}\n\n\
                     Writer's draft:\n{draft}\n\nReturn the final publishable \
                     markdown post, improving structure and fixing factual \
                     gaps where needed."
                );
                self.client
                    .chat(&self.manager.system_prompt(), &review_prompt)
                    .await
                    .context("manager review failed")?
            }
        };

        if self.memory_enabled {
            let digest: String = post.lines().take(3).collect::<Vec<_>>().join(" ");
            self.memory
                .lock()
                .await
                .push(format!("- {topic}: {digest}"));
        }
        if self.cache_enabled {
            self.cache.lock().await.insert(cache_key, post.clone());
        }

        Ok(post)
    }
}

impl Pipeline for Crew {
    fn kickoff<'a>(&'a self, inputs: &'a KickoffInputs) -> BoxFuture<'a, Result<String>> {
        Box::pin(self.run(inputs))
    }
}

/// Explicit map from parameter tuple to crew instance, owned by the hosting
/// session. Guarantees at most one live crew per tuple within a process.
pub struct CrewCache {
    settings: CrewSettings,
    crews: HashMap<CrewKey, Arc<Crew>>,
}

impl CrewCache {
    pub fn new(settings: CrewSettings) -> Self {
        Self {
            settings,
            crews: HashMap::new(),
        }
    }

    /// Return the crew for this tuple, building it on first use. Repeated
    /// calls with an equal tuple return the identical instance.
    pub fn get_or_build(&mut self, key: CrewKey) -> Result<Arc<Crew>> {
        if let Some(crew) = self.crews.get(&key) {
            return Ok(Arc::clone(crew));
        }
        let crew = Arc::new(Crew::build(key, &self.settings)?);
        self.crews.insert(key, Arc::clone(&crew));
        Ok(crew)
    }

    /// Drop every memoized crew. The next `get_or_build` reconstructs.
    pub fn invalidate(&mut self) {
        self.crews.clear();
    }

    pub fn settings(&self) -> &CrewSettings {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::ResolvedEnv;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    /// Chat responder that records every exchange and replays canned replies.
    struct ScriptedChat {
        replies: StdMutex<VecDeque<String>>,
        calls: StdMutex<Vec<(String, String)>>,
    }

    impl ScriptedChat {
        fn new(replies: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                replies: StdMutex::new(replies.iter().map(|s| s.to_string()).collect()),
                calls: StdMutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().expect("calls lock").len()
        }

        fn user_prompt(&self, idx: usize) -> String {
            self.calls.lock().expect("calls lock")[idx].1.clone()
        }
    }

    impl ChatApi for ScriptedChat {
        fn chat<'a>(&'a self, system: &'a str, user: &'a str) -> BoxFuture<'a, Result<String>> {
            self.calls
                .lock()
                .expect("calls lock")
                .push((system.to_string(), user.to_string()));
            let reply = self
                .replies
                .lock()
                .expect("replies lock")
                .pop_front()
                .unwrap_or_else(|| "reply".to_string());
            Box::pin(async move { Ok(reply) })
        }
    }

    fn scripted_crew(
        process: ProcessMode,
        memory: bool,
        cache: bool,
        chat: &Arc<ScriptedChat>,
    ) -> Crew {
        let key = CrewKey {
            process,
            memory,
            cache,
            max_rpm: 60,
        };
        Crew::new(key, "@somechannel", 5, Arc::clone(chat) as Arc<dyn ChatApi>)
    }

    fn inputs(topic: &str) -> KickoffInputs {
        KickoffInputs {
            topic: topic.to_string(),
        }
    }

    #[tokio::test]
    async fn repeat_topic_hits_the_cache_without_llm_calls() {
        let chat = ScriptedChat::new(&["the notes", "the draft"]);
        let crew = scripted_crew(ProcessMode::Sequential, false, true, &chat);

        let first = crew.run(&inputs("AI vs ML")).await.expect("first kickoff");
        assert_eq!(first, "the draft");
        assert_eq!(chat.call_count(), 2);

        // Normalization: trimmed, case-insensitive topic match.
        let second = crew
            .run(&inputs("  ai VS ml "))
            .await
            .expect("second kickoff");
        assert_eq!(second, "the draft");
        assert_eq!(chat.call_count(), 2);
    }

    #[tokio::test]
    async fn disabled_cache_reruns_the_pipeline() {
        let chat = ScriptedChat::new(&["n1", "d1", "n2", "d2"]);
        let crew = scripted_crew(ProcessMode::Sequential, false, false, &chat);

        crew.run(&inputs("AI vs ML")).await.expect("first kickoff");
        let second = crew.run(&inputs("AI vs ML")).await.expect("second kickoff");
        assert_eq!(second, "d2");
        assert_eq!(chat.call_count(), 4);
    }

    #[tokio::test]
    async fn hierarchical_manager_reviews_notes_and_draft() {
        let chat = ScriptedChat::new(&["the notes", "the draft", "the final post"]);
        let crew = scripted_crew(ProcessMode::Hierarchical, false, false, &chat);

        let post = crew.run(&inputs("AI vs ML")).await.expect("kickoff");
        assert_eq!(post, "the final post");
        assert_eq!(chat.call_count(), 3);

        let review = chat.user_prompt(2);
        assert!(review.contains("the notes"));
        assert!(review.contains("the draft"));
    }

    #[tokio::test]
    async fn memory_context_appears_from_the_second_kickoff() {
        let chat = ScriptedChat::new(&["n1", "d1", "n2", "d2"]);
        let crew = scripted_crew(ProcessMode::Sequential, true, false, &chat);

        crew.run(&inputs("AI vs ML")).await.expect("first kickoff");
        assert!(!chat.user_prompt(0).contains("Notes from earlier runs"));
        assert!(!chat.user_prompt(1).contains("Notes from earlier runs"));

        crew.run(&inputs("Rust async")).await.expect("second kickoff");
        assert!(chat.user_prompt(2).contains("Notes from earlier runs"));
        assert!(chat.user_prompt(2).contains("AI vs ML"));
    }

    fn test_settings() -> CrewSettings {
        CrewSettings {
            base_url: "https://api.openai.com/v1".to_string(),
            request_timeout: Duration::from_secs(90),
            env: ResolvedEnv::empty().with_api_key("sk-test"),
        }
    }

    fn key(max_rpm: u32) -> CrewKey {
        CrewKey {
            process: ProcessMode::Sequential,
            memory: true,
            cache: true,
            max_rpm,
        }
    }

    #[test]
    fn equal_tuples_return_the_identical_crew() {
        let mut cache = CrewCache::new(test_settings());
        let a = cache.get_or_build(key(60)).expect("build crew");
        let b = cache.get_or_build(key(60)).expect("build crew");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn changed_rate_limit_builds_a_distinct_crew() {
        let mut cache = CrewCache::new(test_settings());
        let a = cache.get_or_build(key(60)).expect("build crew");
        let b = cache.get_or_build(key(120)).expect("build crew");
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn invalidate_forces_reconstruction() {
        let mut cache = CrewCache::new(test_settings());
        let a = cache.get_or_build(key(60)).expect("build crew");
        cache.invalidate();
        let b = cache.get_or_build(key(60)).expect("build crew");
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn build_without_api_key_fails() {
        let mut settings = test_settings();
        settings.env.openai_api_key = None;
        let mut cache = CrewCache::new(settings);
        assert!(cache.get_or_build(key(60)).is_err());
    }
}
