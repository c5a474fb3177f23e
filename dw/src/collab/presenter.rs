//! User-facing wording
//!
//! Every string the controller shows goes through a `Presenter`, so one
//! state machine serves each locale.

use std::sync::Arc;

use super::Locale;
use crate::session::{InterviewQuestion, Outline};

/// Content types accepted at the start of a session
pub const VALID_CONTENT_TYPES: &[&str] = &["article", "story", "manual", "blog post", "report", "memo", "biography"];

/// Case-insensitive membership in `VALID_CONTENT_TYPES`
pub fn is_valid_content_type(input: &str) -> bool {
    let wanted = input.trim().to_lowercase();
    VALID_CONTENT_TYPES.contains(&wanted.as_str())
}

fn normalized(input: &str) -> String {
    input.trim().to_lowercase()
}

/// Locale-specific messages and vocabulary
pub trait Presenter: Send + Sync {
    fn locale(&self) -> Locale;

    /// Words that accept a proposal (topic, outline, draft)
    fn affirmatives(&self) -> &'static [&'static str];

    /// Words that skip the current interview section
    fn skip_words(&self) -> &'static [&'static str];

    fn is_affirmative(&self, input: &str) -> bool {
        let input = normalized(input);
        self.affirmatives().contains(&input.as_str())
    }

    fn is_skip(&self, input: &str) -> bool {
        let input = normalized(input);
        self.skip_words().contains(&input.as_str())
    }

    fn welcome(&self) -> String;
    fn invalid_content_type(&self) -> String;
    fn ask_topic(&self, content_type: &str) -> String;
    fn topic_suggestion(&self, content_type: &str, topic: &str, feedback: Option<&str>) -> String;
    /// Topic analysis unusable; the raw topic is kept
    fn topic_fallback(&self) -> String;
    fn ask_length(&self) -> String;
    fn refined_topic(&self, topic: &str) -> String;
    fn topic_refine_failed(&self) -> String;
    fn invalid_length(&self) -> String;
    fn outline_generation_failed(&self) -> String;
    fn outline_proposal(&self, content_type: &str, outline: &Outline) -> String;
    fn outline_updated(&self, content_type: &str, topic: &str, target_length: u32, outline: &Outline) -> String;
    fn outline_not_modified(&self, content_type: &str) -> String;
    fn outline_modify_failed(&self) -> String;
    fn question(&self, question: &InterviewQuestion) -> String;
    fn moving_on(&self, section: &str, question: &str) -> String;
    fn draft_ready(&self, draft: &str) -> String;
    fn draft_failed(&self) -> String;
    fn draft_revised(&self, draft: &str) -> String;
    fn revision_failed(&self) -> String;
    fn complete(&self, draft: &str) -> String;
    fn already_complete(&self) -> String;
    fn goodbye(&self) -> String;
}

/// Presenter for a locale
pub fn presenter_for(locale: Locale) -> Arc<dyn Presenter> {
    match locale {
        Locale::En => Arc::new(English),
        Locale::Zh => Arc::new(Chinese),
    }
}

pub struct English;

impl Presenter for English {
    fn locale(&self) -> Locale {
        Locale::En
    }

    fn affirmatives(&self) -> &'static [&'static str] {
        &["y", "yes", "ok", "okay", "sure", "good", "looks good"]
    }

    fn skip_words(&self) -> &'static [&'static str] {
        &["skip", "next", "move on", "continue"]
    }

    fn welcome(&self) -> String {
        "Welcome to the Content Collaboration System!\n\n\
         What type of content would you like to create?\n\
         Options: Article, Story, Manual, Blog Post, Report, Memo, Biography\n\
         Please select one: "
            .to_string()
    }

    fn invalid_content_type(&self) -> String {
        "Sorry, that's not a valid content type. Please choose from:\n\
         Article, Story, Manual, Blog Post, Report, Memo, Biography"
            .to_string()
    }

    fn ask_topic(&self, content_type: &str) -> String {
        format!("Great! Please provide a topic for your {content_type}:")
    }

    fn topic_suggestion(&self, content_type: &str, topic: &str, feedback: Option<&str>) -> String {
        format!(
            "I see you want to create a {content_type}. I suggest we refine the topic to: '{topic}'\n\n\
             {}\n\n\
             Does this direction work for you? (yes/no)\n\
             If not, please share your thoughts and we can refine it further.",
            feedback.unwrap_or_default()
        )
    }

    fn topic_fallback(&self) -> String {
        "I'll help you create content about this topic.\nWhat length (in words) would you like to aim for?".to_string()
    }

    fn ask_length(&self) -> String {
        "Great! What length (in words) would you like to aim for?".to_string()
    }

    fn refined_topic(&self, topic: &str) -> String {
        format!("How about this refined topic: '{topic}'\nDoes this work better? (yes/no)")
    }

    fn topic_refine_failed(&self) -> String {
        "Could you clarify what changes you'd like to make to the topic?".to_string()
    }

    fn invalid_length(&self) -> String {
        "Please provide a number for the target length (in words).".to_string()
    }

    fn outline_generation_failed(&self) -> String {
        "I couldn't generate an outline just now. Please send the target length again to retry.".to_string()
    }

    fn outline_proposal(&self, content_type: &str, outline: &Outline) -> String {
        format!(
            "Here's a proposed outline for your {content_type}:\n{}\n\nDoes this outline work for you? (yes/no)",
            outline.to_json_pretty()
        )
    }

    fn outline_updated(&self, content_type: &str, topic: &str, target_length: u32, outline: &Outline) -> String {
        format!(
            "I've updated the outline for your {target_length}-word {content_type} about {topic}:\n{}\n\n\
             Does this look better? If not, feel free to suggest more changes.",
            outline.to_json_pretty()
        )
    }

    fn outline_not_modified(&self, content_type: &str) -> String {
        format!(
            "I couldn't properly modify the outline for your {content_type}. \
             Could you please provide more specific suggestions? For example:\n\
             - Add a section about X\n\
             - Remove the section on Y\n\
             - Move Z to come before W\n\
             - Split section X into A and B"
        )
    }

    fn outline_modify_failed(&self) -> String {
        "I encountered an error while trying to modify the outline. \
         Could you please provide your suggested changes in a different way? \
         Try being more specific about what sections you'd like to add, remove, or modify."
            .to_string()
    }

    fn question(&self, question: &InterviewQuestion) -> String {
        let mut text = question.question.clone();
        if let Some(rationale) = &question.rationale {
            text.push_str(&format!("\n\nWhy I'm asking: {rationale}"));
        }
        if let Some(example) = &question.example_answer {
            text.push_str(&format!("\nExample answer: {example}"));
        }
        text
    }

    fn moving_on(&self, section: &str, question: &str) -> String {
        format!("Moving on to {section}. {question}")
    }


    fn draft_ready(&self, draft: &str) -> String {
        format!("Great! I'll generate a draft based on our discussion.\n\n{draft}\n\nIs this draft acceptable? (yes/no)")
    }

    fn draft_failed(&self) -> String {
        "I couldn't generate the draft just now. Send any message to try again.".to_string()
    }

    fn draft_revised(&self, draft: &str) -> String {
        format!(
            "I've updated the draft based on your feedback:\n\n{draft}\n\n\
             How's this version? Feel free to suggest more changes, or type 'yes' if you're satisfied."
        )
    }

    fn revision_failed(&self) -> String {
        "I encountered an error while modifying the draft. \
         Could you please provide more specific feedback about what you'd like to change? For example:\n\
         - Clarify a specific section\n\
         - Add more detail about X\n\
         - Make the tone more formal/casual\n\
         - Reorganize the structure"
            .to_string()
    }

    fn complete(&self, draft: &str) -> String {
        format!(
            "Great! Content creation complete. Here's your final Markdown document:\n\n{draft}\n\n\
             You can copy this Markdown content and use it as needed."
        )
    }

    fn already_complete(&self) -> String {
        "Content creation complete. Type 'exit' to quit.".to_string()
    }

    fn goodbye(&self) -> String {
        "Goodbye!".to_string()
    }
}

pub struct Chinese;

impl Presenter for Chinese {
    fn locale(&self) -> Locale {
        Locale::Zh
    }

    fn affirmatives(&self) -> &'static [&'static str] {
        &["y", "yes", "ok", "okay", "sure", "good", "looks good", "好的", "可以", "好"]
    }

    fn skip_words(&self) -> &'static [&'static str] {
        &["skip", "next", "move on", "continue", "跳过", "下一个", "继续"]
    }

    fn welcome(&self) -> String {
        "欢迎使用内容协作系统！\n\n\
         您想创作哪种类型的内容？\n\
         选项：Article, Story, Manual, Blog Post, Report, Memo, Biography\n\
         请选择一个："
            .to_string()
    }

    fn invalid_content_type(&self) -> String {
        "抱歉，这不是有效的内容类型。请从以下选项中选择：\n\
         Article, Story, Manual, Blog Post, Report, Memo, Biography"
            .to_string()
    }

    fn ask_topic(&self, content_type: &str) -> String {
        format!("好的！请提供您的{content_type}的主题：")
    }

    fn topic_suggestion(&self, content_type: &str, topic: &str, feedback: Option<&str>) -> String {
        format!(
            "您想创作一篇{content_type}。我建议将主题调整为：'{topic}'\n\n\
             {}\n\n\
             这个方向可以吗？(yes/no)\n\
             如果不行，请告诉我您的想法，我们可以进一步调整。",
            feedback.unwrap_or_default()
        )
    }

    fn topic_fallback(&self) -> String {
        "我会帮您围绕这个主题创作内容。\n您希望目标字数是多少？".to_string()
    }

    fn ask_length(&self) -> String {
        "好的！您希望目标字数是多少？".to_string()
    }

    fn refined_topic(&self, topic: &str) -> String {
        format!("这个调整后的主题怎么样：'{topic}'\n这样更好吗？(yes/no)")
    }

    fn topic_refine_failed(&self) -> String {
        "您能具体说明想如何修改主题吗？".to_string()
    }

    fn invalid_length(&self) -> String {
        "请输入一个数字作为目标字数。".to_string()
    }

    fn outline_generation_failed(&self) -> String {
        "暂时无法生成大纲。请再次输入目标字数重试。".to_string()
    }

    fn outline_proposal(&self, content_type: &str, outline: &Outline) -> String {
        format!(
            "这是为您的{content_type}拟定的大纲：\n{}\n\n这个大纲可以吗？(yes/no)",
            outline.to_json_pretty()
        )
    }

    fn outline_updated(&self, _content_type: &str, _topic: &str, _target_length: u32, outline: &Outline) -> String {
        format!(
            "我已根据您的建议修改了大纲：\n\n{}\n\n您觉得这个版本怎么样？如果满意，请输入'yes'继续。",
            outline.to_json_pretty()
        )
    }

    fn outline_not_modified(&self, _content_type: &str) -> String {
        "抱歉，我无法正确理解您的修改建议。您可以：\n\
         1. 直接提供JSON格式的完整大纲\n\
         2. 用自然语言描述您想要的修改\n\
         3. 输入'yes'接受当前大纲"
            .to_string()
    }

    fn outline_modify_failed(&self) -> String {
        "处理大纲修改时出错，请重试或提供更清晰的修改建议。".to_string()
    }

    fn question(&self, question: &InterviewQuestion) -> String {
        let mut text = question.question.clone();
        if let Some(rationale) = &question.rationale {
            text.push_str(&format!("\n\n提问原因：{rationale}"));
        }
        if let Some(example) = &question.example_answer {
            text.push_str(&format!("\n示例回答：{example}"));
        }
        text
    }

    fn moving_on(&self, section: &str, question: &str) -> String {
        format!("接下来是{section}部分。{question}")
    }


    fn draft_ready(&self, draft: &str) -> String {
        format!("基于我们的讨论，我生成了以下草稿：\n\n{draft}\n\n您觉得这个草稿怎么样？需要修改吗？")
    }

    fn draft_failed(&self) -> String {
        "暂时无法生成草稿。发送任意消息即可重试。".to_string()
    }

    fn draft_revised(&self, draft: &str) -> String {
        format!(
            "我已根据您的建议修改了草稿：\n\n{draft}\n\n\
             您觉得这个版本怎么样？如果满意，请输入'yes'完成；如果还需要修改，请告诉我具体的建议。"
        )
    }

    fn revision_failed(&self) -> String {
        "抱歉，修改草稿时出错。请提供更具体的修改建议，或者输入'yes'接受当前版本。".to_string()
    }

    fn complete(&self, draft: &str) -> String {
        format!("太好了！内容创作已完成。这是最终的Markdown文档：\n\n{draft}\n\n您可以复制并使用这些内容。")
    }

    fn already_complete(&self) -> String {
        "内容创作已完成。输入'exit'退出。".to_string()
    }

    fn goodbye(&self) -> String {
        "再见！".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_content_types_case_insensitive() {
        for kind in ["Article", "STORY", "manual", "Blog Post", " report ", "memo", "BioGraphy"] {
            assert!(is_valid_content_type(kind), "{kind}");
        }
        for kind in ["poem", "blogpost", "", "articles"] {
            assert!(!is_valid_content_type(kind), "{kind}");
        }
    }

    #[test]
    fn test_affirmatives() {
        let en = English;
        assert!(en.is_affirmative("Yes"));
        assert!(en.is_affirmative("  looks good "));
        assert!(!en.is_affirmative("yes please"));
        assert!(!en.is_affirmative("好的"));
        assert!(Chinese.is_affirmative("好的"));
        assert!(Chinese.is_affirmative("OK"));
    }

    #[test]
    fn test_skip_words() {
        assert!(English.is_skip("Move On"));
        assert!(!English.is_skip("skip this one"));
        assert!(Chinese.is_skip("跳过"));
    }

    #[test]
    fn test_question_rendering() {
        let q = InterviewQuestion {
            question: "What happened?".to_string(),
            rationale: None,
            example_answer: Some("We met at noon.".to_string()),
        };
        assert_eq!(English.question(&q), "What happened?\nExample answer: We met at noon.");
    }

    #[test]
    fn test_rejection_message_is_fixed() {
        assert!(English.invalid_content_type().starts_with("Sorry, that's not a valid content type."));
        assert_eq!(presenter_for(Locale::Zh).locale(), Locale::Zh);
    }
}
