//! Prompt templates for the chat-based generation rounds.
//!
//! Every template asks for a JSON object so responses can be parsed with
//! `response_format: json_object`. Targets, histories, and feedback flow in
//! as plain interpolations; the templates own the persona and constraints.

use fabula_core::gateway::StoryDraft;
use fabula_core::story::StoryContext;

/// System prompt for the opening round: story metadata plus the first draft.
pub(crate) fn open_story(instruction: &str) -> String {
    format!(
        "You are a storyteller for young children. From the child's request, \
         start an engaging, gentle story and ask the child to draw one object \
         from it.\n\
         The child asked for: {instruction}\n\n\
         Respond with a JSON object with exactly these fields:\n\
         - \"title\": a short story title, at most four words\n\
         - \"icon\": a single emoji shortcode (like \"dragon\" or \"rocket\") \
           representing the story\n\
         - \"target\": the name of one simple object from the story for the \
           child to draw\n\
         - \"narration\": the story text to read aloud, at most 100 words, \
           simple vocabulary for a five-year-old\n\
         - \"intro\": one short sentence of at most 10 words inviting the \
           child to draw the target\n\
         - \"scene_description\": a detailed visual description of the scene, \
           like a film still, for an image model; assume a 3:4 portrait frame"
    )
}

/// System prompt for a continuation round.
pub(crate) fn continue_story(context: &StoryContext) -> String {
    format!(
        "You are continuing a story for a young child. Write the next part \
         and ask the child to draw one new object from it.\n\n\
         The story so far:\n{history}\n\n\
         The child has already drawn: {targets}\n\
         The new target must not repeat any of those.\n\n\
         Respond with a JSON object with exactly these fields:\n\
         - \"target\": the name of one simple new object from this part for \
           the child to draw\n\
         - \"narration\": the next story text, at most 100 words, simple \
           vocabulary for a five-year-old\n\
         - \"intro\": one short sentence of at most 10 words inviting the \
           child to draw the target\n\
         - \"scene_description\": a detailed visual description of the scene, \
         like a film still, for an image model; assume a 3:4 portrait frame",
        history = context.joined_history(),
        targets = context.joined_targets(),
    )
}

/// System prompt for the self-check round over a continuation draft.
pub(crate) fn review_draft(context: &StoryContext, draft: &StoryDraft) -> String {
    format!(
        "You are reviewing a children's story continuation before it is \
         read aloud. Check that it follows coherently from the story so far \
         and that the drawing target {target:?} does not repeat an \
         already-drawn item ({targets}).\n\n\
         The story so far:\n{history}\n\n\
         The continuation under review:\n{narration}\n\n\
         Respond with a JSON object with exactly these fields:\n\
         - \"approved\": true when the continuation is acceptable\n\
         - \"objection\": when not approved, one sentence naming what to fix; \
           otherwise null",
        target = draft.target,
        targets = context.joined_targets(),
        history = context.joined_history(),
        narration = draft.narration,
    )
}

/// System prompt regenerating a rejected draft, guided by the objection.
pub(crate) fn revise_draft(
    context: &StoryContext,
    draft: &StoryDraft,
    objection: &str,
) -> String {
    format!(
        "{base}\n\n\
         A previous attempt was rejected: {objection}\n\
         The rejected attempt asked for {target:?} and read:\n{narration}\n\
         Write a fresh continuation that resolves the objection.",
        base = continue_story(context),
        objection = objection,
        target = draft.target,
        narration = draft.narration,
    )
}

/// System prompt for grading a child's drawing against the expected target.
pub(crate) fn grade_drawing(expected_target: &str) -> String {
    format!(
        "You are looking at a drawing made by a young child. Decide whether \
         it shows a {expected_target}. It is a child's doodle: it does not \
         need to be accurate, it only needs to resemble a {expected_target}, \
         and it may contain extra elements.\n\n\
         Respond with a JSON object with exactly these fields:\n\
         - \"is_correct\": whether the drawing resembles a {expected_target}\n\
         - \"feedback\": at most 30 words spoken to the child; praise a \
           correct drawing warmly, or encourage another try with one \
           concrete, kind tip"
    )
}
