//! The fixed stage plans of a run.
//!
//! Stage order is Analysis → Architecture → Code Generation → Refinement →
//! Finalize. Analysis fans out over the walkthrough footage and the
//! narration transcript in parallel; everything downstream is sequential.

use std::time::Duration;

use crate::stage::{StagePlan, SuccessPolicy, TaskSpec};

/// Stage names, also the keys for per-stage timeout overrides.
pub const STAGE_ANALYSIS: &str = "analysis";
pub const STAGE_ARCHITECTURE: &str = "architecture";
pub const STAGE_CODE_GENERATION: &str = "code_generation";
pub const STAGE_FINALIZE: &str = "finalize";

const WALKTHROUGH_ANALYSIS_INSTRUCTION: &str = "\
Analyze the recorded product walkthrough described above. Identify every \
distinct screen, the navigation flow between screens, the layout of each \
screen (header, hero, content sections, footer), and the visual design \
tokens in use: color palette, typography, spacing, imagery style. Answer \
as a structured summary, one screen per section.";

const NARRATION_EXTRACTION_INSTRUCTION: &str = "\
Extract the site content from the narration transcript above. Capture the \
headings, body copy, calls to action, product names, and any factual \
claims, preserving the narrator's wording where it reads well. Answer as a \
structured content inventory grouped by the screen it belongs to.";

const ARCHITECTURE_INSTRUCTION: &str = "\
Using the walkthrough analysis and the content inventory above, design the \
website architecture: the page map, the sections of each page, the \
components each section is built from, and a style guide (colors, fonts, \
spacing scale) derived from the observed design tokens. Answer as a \
structured plan the code generator can follow directly.";

const GENERATION_INSTRUCTION: &str = "\
Generate the complete website from the architecture plan and content above \
as three code blocks: one fenced `html` block with the full markup (link \
styles.css and scripts.js), one fenced `css` block with the complete \
stylesheet, and one fenced `js` block with all interaction code. If \
validation feedback is present above, resolve every issue it lists. Output \
only the three fenced blocks.";

/// The parallel analysis stage: walkthrough and narration examined
/// concurrently, both results required.
#[must_use]
pub fn analysis_plan(timeout: Duration) -> StagePlan {
    StagePlan::parallel(
        STAGE_ANALYSIS,
        timeout,
        SuccessPolicy::AllMustSucceed,
        vec![
            TaskSpec::new("walkthrough_analysis", WALKTHROUGH_ANALYSIS_INSTRUCTION),
            TaskSpec::new("narration_extraction", NARRATION_EXTRACTION_INSTRUCTION),
        ],
    )
}

/// The architecture stage: one task, fed by both analysis outputs.
#[must_use]
pub fn architecture_plan(timeout: Duration) -> StagePlan {
    StagePlan::sequential(
        STAGE_ARCHITECTURE,
        timeout,
        vec![TaskSpec::new("site_architecture", ARCHITECTURE_INSTRUCTION)],
    )
}

/// One generation pass of the refinement cycle. The same plan serves the
/// initial pass and every regeneration; feedback arrives via the context.
#[must_use]
pub fn generation_plan(timeout: Duration) -> StagePlan {
    StagePlan::sequential(
        STAGE_CODE_GENERATION,
        timeout,
        vec![TaskSpec::new("site_bundle", GENERATION_INSTRUCTION)],
    )
}
