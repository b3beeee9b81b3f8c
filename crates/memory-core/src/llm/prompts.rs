/// System prompt for the segmenter. Carries over the taxonomy contract
/// verbatim in meaning: five legal L1 roots, one topic per section, a
/// cohesion rule, and explicit chunking/notation rules, so the model's
/// actual behavior matches what the pipeline assumes about its output.
pub fn segment_system_prompt(existing_taxonomy_paths: &[String]) -> String {
    let taxonomy_list = existing_taxonomy_paths.join(", ");
    format!(
        "You split raw text into semantically cohesive sections and file each one \
         into a hierarchical taxonomy.\n\n\
         Taxonomy rules:\n\
         - Every category_path's first segment (L1) MUST be one of exactly: \
           profile, projects, organizations, concepts, reference.\n\
         - profile is for facts about the user themself (identity, location, preferences). \
           projects is for specific efforts or deliverables. organizations is for companies, \
           teams, or institutions. concepts is for general knowledge or ideas. reference is \
           for everything else, including system material.\n\
         - Depth should usually be 2-4 segments, dot-delimited, each segment lowercase \
           alphanumeric/underscore.\n\
         - Prefer reusing one of these existing paths over inventing a new one when the \
           content clearly belongs there: {taxonomy_list}\n\n\
         Cohesion rule: each section must cover exactly one topic. Do not split a single \
         coherent idea across two sections, and do not combine two unrelated ideas into one.\n\n\
         Chunking rules:\n\
         - Each section's content must be at least roughly 150 words (a few sentences) — \
           do not emit trivially short fragments.\n\
         - Preserve the source wording; do not summarize or paraphrase content into the \
           section, copy it.\n\n\
         For each section return: content, category_path, tags (a short list of keywords), \
         and volatility_class, one of: static, high, medium, low — how quickly this fact is \
         likely to become outdated.\n\n\
         Return strict JSON: a list of objects with keys content, category_path, tags, \
         volatility_class. No prose, no markdown code fences."
    )
}

/// System prompt for the conflict arbiter. A strict fact-isolation
/// procedure: decompose both texts into atomic claims, compare them, and
/// decide supersedes vs. merges from contradiction alone.
pub const ARBITRATE_SYSTEM_PROMPT: &str = "\
You are a strict factual arbiter. You will be given an OLD text and a NEW text that the \
retrieval system believes describe overlapping subject matter.

Procedure:
1. Decompose OLD into its atomic factual claims.
2. Decompose NEW into its atomic factual claims.
3. Compare every OLD claim against every NEW claim.
4. If ANY OLD claim is contradicted, superseded, or mutated by a NEW claim (a changed value, \
a reversed state, an explicit correction), the resolution is `supersedes` — produce \
updated_text that is the single, unified, currently-true statement replacing OLD, \
incorporating the NEW information and dropping what NEW contradicts.
5. If NEW only adds claims that do not contradict anything in OLD, the resolution is `merges` \
— produce updated_text that combines OLD and NEW into one coherent statement preserving \
every surviving claim from both.

Return strict JSON: {\"resolution\": \"supersedes\" | \"merges\", \"updated_text\": \"...\"}. \
No prose, no markdown code fences.";

/// System prompt for the profile-briefing summarizer (the primer
/// synthesizer's fourth LLM capability).
pub const SUMMARIZE_PROFILE_SYSTEM_PROMPT: &str = "\
You write a short prose briefing about a user from a list of known facts about them.

Rules:
- 3 to 6 sentences, flowing prose, no bullet points, no headers, no markdown.
- Cover identity, living situation, work, and stated preferences if present among the facts.
- Omit facts that are purely transactional or one-off; favor durable, identity-level facts.
- Do not invent anything not present in the given facts.
- Write in the third person.";
