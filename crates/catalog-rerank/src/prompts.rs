//! Prompt templates for the relevance judges.

pub const RERANK_SYSTEM: &str = "You are a relevance judge. Your task is to determine if a document is relevant to a search query.\n\
Respond with ONLY 'Yes' if the document answers or relates to the query, or 'No' if it does not.\n\
Do not explain your reasoning. Answer with a single word: Yes or No.";

pub const MAX_DOC_CHARS: usize = 2000;

/// Cut `text` to at most `max_chars` characters on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

pub fn format_rerank_prompt(query: &str, document: &str) -> String {
    let document = truncate_chars(document, MAX_DOC_CHARS);
    format!("Query: {query}\n\nDocument:\n{document}\n\nIs this document relevant to the query? Answer Yes or No:")
}

/// Batch "choice select" prompt: the model lists relevant documents by number
/// with a 1-10 relevance score, one `Doc: N, Relevance: R` line each.
pub fn format_choice_prompt(query: &str, documents: &[&str]) -> String {
    let mut context = String::new();
    for (i, doc) in documents.iter().enumerate() {
        context.push_str(&format!("Document {}:\n{}\n\n", i + 1, truncate_chars(doc, MAX_DOC_CHARS)));
    }
    format!(
        "A list of documents is shown below. Each document has a number next to it. A question is also provided.\n\
Respond with the numbers of the documents you should consult to answer the question, in order of relevance, \
as well as the relevance score. The relevance score is a number from 1-10 based on how relevant you think \
the document is to the question.\n\
Do not include any documents that are not relevant to the question.\n\
Example format:\n\
Doc: 9, Relevance: 7\n\
Doc: 3, Relevance: 4\n\n\
{context}Question: {query}\nAnswer:\n"
    )
}

/// Parse `Doc: N, Relevance: R` lines into `(zero_based_index, relevance)`.
/// Lines that do not parse or point outside `1..=num_docs` are ignored.
pub fn parse_choice_answer(answer: &str, num_docs: usize) -> Vec<(usize, f32)> {
    let mut choices = Vec::new();
    for line in answer.lines() {
        let Some((doc_part, rel_part)) = line.split_once(',') else { continue };
        let doc = doc_part.trim().strip_prefix("Doc:").and_then(|n| n.trim().parse::<usize>().ok());
        let relevance = rel_part.trim().strip_prefix("Relevance:").and_then(|r| r.trim().parse::<f32>().ok());
        let (Some(doc), Some(relevance)) = (doc, relevance) else { continue };
        if (1..=num_docs).contains(&doc) {
            choices.push((doc - 1, relevance));
        }
    }
    choices
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn rerank_prompt_embeds_query_and_document() {
        let p = format_rerank_prompt("rust traits", "Traits define shared behaviour.");
        assert_eq!(
            p,
            "Query: rust traits\n\nDocument:\nTraits define shared behaviour.\n\nIs this document relevant to the query? Answer Yes or No:"
        );
    }

    #[test]
    fn long_documents_are_truncated_on_char_boundaries() {
        let doc = "é".repeat(MAX_DOC_CHARS + 10);
        let p = format_rerank_prompt("q", &doc);
        assert_eq!(p.matches('é').count(), MAX_DOC_CHARS);
    }

    #[test]
    fn choice_answers_parse_and_skip_noise() {
        let answer = "Doc: 2, Relevance: 8\nsomething else\nDoc: 9, Relevance: 3\nDoc: 1, Relevance: 5.5";
        assert_eq!(parse_choice_answer(answer, 3), vec![(1, 8.0), (0, 5.5)]);
    }

    #[test]
    fn choice_prompt_numbers_documents_from_one() {
        let p = format_choice_prompt("q", &["alpha", "beta"]);
        assert!(p.contains("Document 1:\nalpha\n\nDocument 2:\nbeta\n\nQuestion: q\nAnswer:\n"));
    }
}
