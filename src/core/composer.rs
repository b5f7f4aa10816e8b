/// Segment composer: assembles one segment of text from catalog fragments.

use rand::Rng;

use crate::core::catalog::{draw, MergeTone, TemplateCatalog};
use crate::core::config::StoryConfig;
use crate::core::context::StoryContext;
use crate::core::template::Template;
use crate::core::variety::VarietyPass;
use crate::schema::interaction::Influence;

/// An element minted into the story while composing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Introduction {
    Character(String),
    Location(String),
}

/// Finished text plus the word count fed back for length accounting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Composition {
    pub content: String,
    pub word_count: usize,
    pub introduced: Option<Introduction>,
}

impl Composition {
    fn new(content: String, introduced: Option<Introduction>) -> Self {
        let word_count = content.split_whitespace().count();
        Self {
            content,
            word_count,
            introduced,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentComposer {
    location_probability: f64,
    introduce_probability: f64,
    variety: VarietyPass,
}

impl SegmentComposer {
    pub fn new(config: &StoryConfig) -> Self {
        Self {
            location_probability: config.location_probability,
            introduce_probability: config.introduce_probability,
            variety: VarietyPass::new(config.target_segment_chars),
        }
    }

    /// Compose the first segment of a story. Seeds one character and one
    /// location from the genre's stock names.
    pub fn compose_opening<R: Rng + ?Sized>(
        &self,
        ctx: &mut StoryContext,
        catalog: &TemplateCatalog,
        rng: &mut R,
    ) -> Composition {
        let character = draw(catalog.character_names(ctx.genre), rng)
            .cloned()
            .unwrap_or_else(|| "a stranger".to_string());
        let location = draw(catalog.location_names(ctx.genre), rng)
            .cloned()
            .unwrap_or_else(|| "an unknown place".to_string());

        let opening = draw(catalog.openings(ctx.genre), rng)
            .map(|t| fill(t, &character, &location))
            .unwrap_or_else(|| format!("{} arrived at {}.", character, location));

        ctx.introduce_character(character);
        ctx.introduce_location(location);
        ctx.add_theme(ctx.mood.theme());

        Composition::new(self.variety.apply(&[opening]), None)
    }

    /// Compose the next segment from the context's current mood, phase and
    /// genre. May introduce one new character or location into the context.
    pub fn compose<R: Rng + ?Sized>(
        &self,
        ctx: &mut StoryContext,
        influence: &Influence,
        catalog: &TemplateCatalog,
        rng: &mut R,
    ) -> Composition {
        let mut fragments = Vec::with_capacity(3);

        // 1-2. Transition by mood, then phrasing by phase
        let mut sentence = Vec::with_capacity(4);
        if let Some(t) = draw(catalog.transitions(ctx.mood), rng) {
            sentence.push(t.text());
        }
        if let Some(t) = draw(catalog.phase_phrases(ctx.phase()), rng) {
            sentence.push(t.text());
        }

        // 3. Character and action
        let character = pick_known(ctx.characters().iter(), rng)
            .or_else(|| draw(catalog.character_names(ctx.genre), rng).cloned())
            .unwrap_or_else(|| "a stranger".to_string());
        let action = draw(catalog.actions(ctx.mood), rng)
            .map(|t| fill(t, &character, ""))
            .unwrap_or_else(|| format!("{} pressed on", character));
        sentence.push(action);

        // 4. Optional location clause
        let location_p = boosted(self.location_probability, influence.introduce_probability_boost);
        if rng.gen_bool(location_p) {
            let location = pick_known(ctx.locations().iter(), rng)
                .or_else(|| draw(catalog.location_names(ctx.genre), rng).cloned());
            if let (Some(location), Some(clause)) = (location, draw(catalog.location_clauses(ctx.genre), rng)) {
                sentence.push(fill(clause, "", &location));
            }
        }
        fragments.push(format!("{}.", sentence.join(" ")));

        // 5. Optional new element
        let mut introduced = None;
        let introduce_p = boosted(self.introduce_probability, influence.introduce_probability_boost);
        if rng.gen_bool(introduce_p) {
            if rng.gen_bool(0.5) {
                if let Some(name) = draw(catalog.character_names(ctx.genre), rng).cloned() {
                    if ctx.introduce_character(name.clone()) {
                        if let Some(t) = draw(catalog.introductions(), rng) {
                            fragments.push(fill(t, &name, ""));
                        }
                        introduced = Some(Introduction::Character(name));
                    }
                }
            } else if let Some(name) = draw(catalog.location_names(ctx.genre), rng).cloned() {
                if ctx.introduce_location(name.clone()) {
                    if let Some(t) = draw(catalog.discoveries(), rng) {
                        fragments.push(fill(t, "", &name));
                    }
                    introduced = Some(Introduction::Location(name));
                }
            }
        }

        // 6. Finish and trim to budget
        Composition::new(self.variety.apply(&fragments), introduced)
    }

    /// Compose a merged segment: the source's text behind a transition whose
    /// tone reflects how the two stories relate.
    pub fn compose_merge<R: Rng + ?Sized>(
        &self,
        source_content: &str,
        tone: MergeTone,
        catalog: &TemplateCatalog,
        rng: &mut R,
    ) -> Composition {
        let transition = draw(catalog.merge_transitions(tone), rng)
            .map(Template::text)
            .unwrap_or_else(|| "Another story intersected:".to_string());
        let content = format!("{} {}", transition, source_content.trim());
        Composition::new(content.split_whitespace().collect::<Vec<_>>().join(" "), None)
    }
}

fn boosted(base: f64, boost: f64) -> f64 {
    (base + boost).clamp(0.0, 1.0)
}

fn fill(template: &Template, character: &str, location: &str) -> String {
    template.render(|slot| match slot {
        "character" => Some(character),
        "location" => Some(location),
        _ => None,
    })
}

fn pick_known<'a, I, R>(names: I, rng: &mut R) -> Option<String>
where
    I: ExactSizeIterator<Item = &'a String>,
    R: Rng + ?Sized,
{
    let mut names = names;
    let len = names.len();
    if len == 0 {
        return None;
    }
    names.nth(rng.gen_range(0..len)).cloned()
}
