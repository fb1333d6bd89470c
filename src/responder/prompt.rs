const INSTRUCTIONS: &str = "Use the following pieces of context to answer the question at the end. \
If you don't know the answer, just say that you don't know, don't try to make up an answer.";

/// Build a single prompt holding every passage, separated by blank lines,
/// followed by the question
#[inline]
pub fn stuff_prompt(question: &str, passages: &[String]) -> String {
    let context = passages
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "{}\n\n{}\n\nQuestion: {}\nHelpful Answer:",
        INSTRUCTIONS,
        context,
        question.trim()
    )
}
