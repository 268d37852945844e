use crate::models::Language;

pub struct Prompts;

impl Prompts {
    pub const CONVERSATION_EN: &'static str = r###"The following is a friendly conversation between a human and an AI. The AI is talkative and provides lots of specific details from its context. If the AI does not know the answer to a question, it truthfully says it does not know.
Always answer in English."###;
    pub const CONVERSATION_FR: &'static str = r###"Ce qui suit est une conversation amicale entre un humain et une IA. L'IA est bavarde et fournit de nombreux détails précis tirés de son contexte. Si l'IA ne connaît pas la réponse à une question, elle dit honnêtement qu'elle ne sait pas.
Réponds toujours en français."###;

    pub const QA_EN: &'static str = r###"Use the following pieces of context to answer the question at the end. If you don't know the answer, just say that you don't know, don't try to make up an answer.
Always answer in English.

{context}"###;
    pub const QA_FR: &'static str = r###"Utilise les extraits de contexte suivants pour répondre à la question posée à la fin. Si tu ne connais pas la réponse, dis simplement que tu ne sais pas, n'essaie pas d'inventer une réponse.
Réponds toujours en français.

{context}"###;

    pub const SUMMARY_EN: &'static str = r###"Write a concise summary of the following document, in English.

"{text}"

CONCISE SUMMARY:"###;
    pub const SUMMARY_FR: &'static str = r###"Rédige un résumé concis du document suivant, en français.

"{text}"

RÉSUMÉ CONCIS :"###;

    pub const SUMMARIES_HEADER_EN: &'static str = "Summaries of the project documents discussed in this chat:";
    pub const SUMMARIES_HEADER_FR: &'static str = "Résumés des documents du projet abordés dans cette conversation :";

    pub fn conversation(language: Language) -> &'static str {
        match language {
            Language::En => Self::CONVERSATION_EN,
            Language::Fr => Self::CONVERSATION_FR,
        }
    }

    pub fn qa(language: Language, context: &str) -> String {
        let template = match language {
            Language::En => Self::QA_EN,
            Language::Fr => Self::QA_FR,
        };
        template.replace("{context}", context)
    }

    pub fn summary(language: Language, text: &str) -> String {
        let template = match language {
            Language::En => Self::SUMMARY_EN,
            Language::Fr => Self::SUMMARY_FR,
        };
        template.replace("{text}", text)
    }

    pub fn summaries_header(language: Language) -> &'static str {
        match language {
            Language::En => Self::SUMMARIES_HEADER_EN,
            Language::Fr => Self::SUMMARIES_HEADER_FR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_carry_their_placeholders() {
        assert!(Prompts::QA_EN.contains("{context}"));
        assert!(Prompts::QA_FR.contains("{context}"));
        assert!(Prompts::SUMMARY_EN.contains("{text}"));
        assert!(Prompts::SUMMARY_FR.contains("{text}"));
    }

    #[test]
    fn rendering_fills_placeholders() {
        let qa = Prompts::qa(Language::Fr, "extrait 1");
        assert!(qa.contains("extrait 1"));
        assert!(!qa.contains("{context}"));
        assert!(qa.contains("français"));

        let summary = Prompts::summary(Language::En, "body of text");
        assert!(summary.contains("\"body of text\""));
        assert!(!summary.contains("{text}"));
    }

    #[test]
    fn conversation_prompt_follows_language() {
        assert!(Prompts::conversation(Language::En).contains("English"));
        assert!(Prompts::conversation(Language::Fr).contains("français"));
    }
}
