//! The two fixed agent roles the crew is built from, plus the manager used
//! by hierarchical runs. Role text is data; the front-end never inspects it.

/// A role the LLM is asked to play for one task.
#[derive(Debug, Clone)]
pub struct Agent {
    pub role: String,
    pub goal: String,
    pub backstory: String,
}

impl Agent {
    /// Render the role as a system prompt.
    pub fn system_prompt(&self) -> String {
        format!(
            "You are {role}.\nYour goal: {goal}\nBackground: {backstory}",
            role = self.role,
            goal = self.goal,
            backstory = self.backstory,
        )
    }
}

pub fn blog_researcher(channels: &str, max_results: u32) -> Agent {
    Agent {
        role: "a blog researcher specialized in YouTube video content".to_string(),
        goal: format!(
            "gather accurate, well-structured notes on the given topic, \
             drawing on what the channels {channels} (up to {max_results} \
             recent videos per channel) cover about it"
        ),
        backstory: "You have spent years summarizing technical videos on AI, \
                    machine learning and data science into clear research notes \
                    that writers can build on without watching the videos."
            .to_string(),
    }
}

pub fn blog_writer() -> Agent {
    Agent {
        role: "a technical blog writer".to_string(),
        goal: "turn research notes into a ready-to-publish markdown blog post".to_string(),
        backstory: "You write engaging, accurate long-form posts for a developer \
                    audience and keep a consistent voice from title to conclusion."
            .to_string(),
    }
}

/// Manager role for hierarchical runs: reviews both task outputs and owns the
/// final post.
pub fn crew_manager() -> Agent {
    Agent {
        role: "an editorial manager coordinating a research and writing crew".to_string(),
        goal: "review the researcher's notes and the writer's draft, then \
               deliver the final publishable post"
            .to_string(),
        backstory: "You delegate research and drafting to specialists and sign \
                    off on the final piece, fixing structure and factual gaps \
                    before publication."
            .to_string(),
    }
}
