//! The two fixed task definitions. Descriptions are templates with a
//! `{topic}` placeholder; the crew interpolates at kickoff.

/// One unit of work handed to an agent.
#[derive(Debug, Clone)]
pub struct TaskSpec {
    pub name: &'static str,
    pub description: String,
    pub expected_output: String,
}

impl TaskSpec {
    /// Interpolate the topic and append the expected-output contract.
    pub fn render(&self, topic: &str) -> String {
        format!(
            "{}\n\nExpected output: {}",
            self.description.replace("{topic}", topic),
            self.expected_output
        )
    }
}

pub fn research_task(channels: &str, max_results: u32) -> TaskSpec {
    TaskSpec {
        name: "research",
        description: format!(
            "Research the topic \"{{topic}}\". Focus on how the YouTube \
             channels {channels} treat it (consider up to {max_results} recent \
             videos per channel). Identify the key concepts, the distinctions \
             that matter, common misconceptions, and concrete examples worth \
             citing in a blog post."
        ),
        expected_output: "A structured set of research notes in markdown: key \
                          points, definitions, comparisons, and examples, with \
                          a short summary at the top."
            .to_string(),
    }
}

pub fn write_task() -> TaskSpec {
    TaskSpec {
        name: "write",
        description: "Using the research notes provided as context, write a \
                      complete blog post on \"{topic}\" for a developer \
                      audience. Open with a hook, structure the body with \
                      markdown headings, and close with a takeaway."
            .to_string(),
        expected_output: "A ready-to-publish markdown blog post, title \
                          included, at least 800 words."
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_interpolates_topic() {
        let task = write_task();
        let rendered = task.render("AI vs ML");
        assert!(rendered.contains("\"AI vs ML\""));
        assert!(!rendered.contains("{topic}"));
        assert!(rendered.contains("Expected output:"));
    }

    #[test]
    fn research_task_carries_channel_context() {
        let task = research_task("@somechannel", 7);
        assert!(task.description.contains("@somechannel"));
        assert!(task.description.contains('7'));
    }
}
