//! Turn order selection
//!
//! Every cycle starts from a fresh uniform shuffle so no persona is favored
//! across cycles. Mentioned personas are pulled to the front, and the
//! trigger's author is kept from leading whenever someone else can.

use rand::Rng;
use rand::seq::SliceRandom;

use crate::persona::Persona;

/// Characters that may continue a name after `@name`
fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

/// Whether `text` contains `@name` as a whole token
pub fn is_mentioned(text: &str, name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    let needle = format!("@{}", name);
    text.match_indices(&needle).any(|(idx, _)| {
        text[idx + needle.len()..]
            .chars()
            .next()
            .is_none_or(|c| !is_name_char(c))
    })
}

/// Names from `candidates` that `text` mentions, in candidate order
pub fn mentioned_names<'a>(text: &str, candidates: &'a [String]) -> Vec<&'a str> {
    candidates
        .iter()
        .filter(|name| is_mentioned(text, name))
        .map(String::as_str)
        .collect()
}

/// Compute the order in which personas get a chance to respond.
///
/// The result is always a permutation of `personas`. Mentioned personas form
/// its prefix (in shuffled order among themselves). If the head would be the
/// author, it is swapped with the first later persona that is not.
pub fn select_order<'a, R>(
    personas: &'a [Persona],
    author: &str,
    mentioned: &[&str],
    rng: &mut R,
) -> Vec<&'a Persona>
where
    R: Rng + ?Sized,
{
    let mut shuffled: Vec<&Persona> = personas.iter().collect();
    shuffled.shuffle(rng);

    let (mut order, rest): (Vec<&Persona>, Vec<&Persona>) = shuffled
        .into_iter()
        .partition(|p| mentioned.contains(&p.name()));
    if !order.is_empty() {
        tracing::debug!(
            "Mentioned: {:?}",
            order.iter().map(|p| p.name()).collect::<Vec<_>>()
        );
    }
    order.extend(rest);

    if order.first().is_some_and(|p| p.name() == author) {
        if let Some(swap) = order.iter().position(|p| p.name() != author) {
            order.swap(0, swap);
        }
    }

    order
}
