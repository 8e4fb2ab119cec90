//! Roster selection.
//!
//! Picks servers for a service by preferred group first, then by lowest
//! participation count, while reserving a quota of slots for people with an
//! accommodation note. Selection is deterministic: ties keep table order.

use std::collections::HashSet;

use crate::models::Person;

/// Group label meaning "no preference".
pub const OTHER_GROUP: &str = "Lainnya";

/// Tunables of the selection rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionRules {
    /// Divisor `d` in the special-needs quota `max(1, required / d)`
    pub special_quota_divisor: usize,
}

impl Default for SelectionRules {
    fn default() -> Self {
        Self {
            special_quota_divisor: 4,
        }
    }
}

impl SelectionRules {
    pub fn new(special_quota_divisor: usize) -> Self {
        Self {
            special_quota_divisor: special_quota_divisor.max(1),
        }
    }

    /// Minimum number of special-needs slots for a roster of `required_count`.
    pub fn special_needed(&self, required_count: usize) -> usize {
        (required_count / self.special_quota_divisor.max(1)).max(1)
    }
}

/// Outcome of a server selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection<'a> {
    pub members: Vec<&'a Person>,
    pub special_needed: usize,
    /// Slots left empty because the pool ran out
    pub shortfall: usize,
}

impl Selection<'_> {
    pub fn special_count(&self) -> usize {
        self.members.iter().filter(|p| p.is_special_needs()).count()
    }
}

/// Normalize a preferred group; empty and [`OTHER_GROUP`] disable the filter.
pub fn group_filter(preferred_group: Option<&str>) -> Option<&str> {
    preferred_group
        .map(str::trim)
        .filter(|group| !group.is_empty() && !group.eq_ignore_ascii_case(OTHER_GROUP))
}

fn by_participation<'a>(pool: &[&'a Person]) -> Vec<&'a Person> {
    let mut sorted = pool.to_vec();
    // stable: equal counts keep table order
    sorted.sort_by_key(|p| p.participation_count);
    sorted
}

/// Move up to `wanted` unchosen candidates matching `accept` into `selected`.
fn fill<'a>(
    candidates: &[&'a Person],
    wanted: usize,
    accept: impl Fn(&Person) -> bool,
    selected: &mut Vec<&'a Person>,
    chosen: &mut HashSet<&'a str>,
) {
    if wanted == 0 {
        return;
    }
    let picks: Vec<&'a Person> = candidates
        .iter()
        .copied()
        .filter(|p| !chosen.contains(p.id.as_str()) && accept(*p))
        .take(wanted)
        .collect();
    for person in picks {
        chosen.insert(person.id.as_str());
        selected.push(person);
    }
}

/// Swap the latest regular picks for unchosen special-needs candidates until
/// the quota is met or no special-needs candidate is left.
fn guarantee_quota<'a>(
    sorted: &[&'a Person],
    special_needed: usize,
    selected: &mut Vec<&'a Person>,
    chosen: &mut HashSet<&'a str>,
) {
    let included = selected.iter().filter(|p| p.is_special_needs()).count();
    if included >= special_needed {
        return;
    }
    let missing: Vec<&'a Person> = sorted
        .iter()
        .copied()
        .filter(|p| p.is_special_needs() && !chosen.contains(p.id.as_str()))
        .take(special_needed - included)
        .collect();
    for special in missing {
        let Some(position) = selected.iter().rposition(|p| !p.is_special_needs()) else {
            break;
        };
        let dropped = selected.remove(position);
        chosen.remove(dropped.id.as_str());
        chosen.insert(special.id.as_str());
        selected.push(special);
    }
}

/// Select `required_count` servers from `pool`.
///
/// `pool` must already be restricted to the server role. When the pool is
/// smaller than `required_count` the whole pool is returned and the missing
/// slots are reported as `shortfall`. The result holds at least
/// `special_needed` special-needs people whenever the pool has that many.
pub fn select_roster<'a>(
    pool: &[&'a Person],
    required_count: usize,
    preferred_group: Option<&str>,
    rules: &SelectionRules,
) -> Selection<'a> {
    let special_needed = rules.special_needed(required_count);
    if required_count == 0 {
        return Selection {
            members: Vec::new(),
            special_needed: 0,
            shortfall: 0,
        };
    }

    let group = group_filter(preferred_group);
    let sorted = by_participation(pool);

    let working: Vec<&'a Person> = sorted
        .iter()
        .copied()
        .filter(|p| group.map_or(true, |g| p.group == g))
        .take(required_count)
        .collect();
    let (regular, special): (Vec<&'a Person>, Vec<&'a Person>) =
        working.into_iter().partition(|p| !p.is_special_needs());

    let mut selected = Vec::with_capacity(required_count);
    let mut chosen = HashSet::new();
    let regular_is_short = regular.len() < required_count;
    fill(&regular, regular.len(), |_| true, &mut selected, &mut chosen);
    if regular_is_short {
        fill(&special, special_needed, |_| true, &mut selected, &mut chosen);
    }

    if selected.len() < required_count {
        let special_included = selected.iter().filter(|p| p.is_special_needs()).count();
        if special_included < special_needed {
            let wanted = (special_needed - special_included).min(required_count - selected.len());
            fill(
                &sorted,
                wanted,
                Person::is_special_needs,
                &mut selected,
                &mut chosen,
            );
        }
        let remaining = required_count - selected.len();
        fill(
            &sorted,
            remaining,
            |p| !p.is_special_needs(),
            &mut selected,
            &mut chosen,
        );
        // pool has run out of regular candidates; take whoever is left
        let remaining = required_count - selected.len();
        fill(&sorted, remaining, |_| true, &mut selected, &mut chosen);
    }

    guarantee_quota(&sorted, special_needed, &mut selected, &mut chosen);

    let shortfall = required_count - selected.len();
    Selection {
        members: selected,
        special_needed,
        shortfall,
    }
}

/// Select one organist.
///
/// Organists from the preferred group come first; otherwise the whole pool is
/// used. The special-needs quota does not apply.
pub fn select_organist<'a>(pool: &[&'a Person], preferred_group: Option<&str>) -> Option<&'a Person> {
    let sorted = by_participation(pool);
    group_filter(preferred_group)
        .and_then(|group| sorted.iter().copied().find(|p| p.group == group))
        .or_else(|| sorted.first().copied())
}
