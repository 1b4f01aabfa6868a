use crate::{Branch, Candidate, Effect, Msg, RunMode, RunOutcome, RunState, RunStatus};

/// Pure update function: applies a message to the run and returns the effects to execute.
///
/// Effects are ordered; a `Navigate` is always preceded by the write that makes the
/// run durable, since nothing in memory survives the navigation.
pub fn update(mut state: RunState, msg: Msg) -> (RunState, Vec<Effect>) {
    let effects = match msg {
        Msg::StartRequested {
            query,
            mode,
            now,
            search_ref,
        } => {
            let query = query.trim().to_string();
            if query.is_empty() {
                return (state, Vec::new());
            }
            state.start(query, mode, now);
            vec![
                Effect::PersistRun,
                Effect::Navigate {
                    navigable_ref: search_ref,
                },
            ]
        }
        Msg::StopRequested => {
            if state.status == RunStatus::Idle {
                Vec::new()
            } else {
                state = RunState::new();
                vec![Effect::ClearRun]
            }
        }
        Msg::BranchesListed(branches) => {
            if !state.is_active() {
                return (state, Vec::new());
            }
            list_branches(&mut state, branches)
        }
        Msg::BranchSelected(index) => {
            if state.status != RunStatus::AwaitingSelection {
                return (state, Vec::new());
            }
            match state.offered_branches.get(index).cloned() {
                Some(branch) => advance(&mut state, branch),
                None => Vec::new(),
            }
        }
        Msg::LeafCollectionResolved(leaf_ref) => {
            if !state.is_active() {
                return (state, Vec::new());
            }
            match leaf_ref {
                Some(navigable_ref) => {
                    state.status = RunStatus::LeafScanning;
                    vec![Effect::PersistRun, Effect::Navigate { navigable_ref }]
                }
                None => next_branch_or_finish(&mut state),
            }
        }
        Msg::CacheHit(candidate) => {
            if !state.is_active() {
                return (state, Vec::new());
            }
            found(&mut state, candidate, true)
        }
        Msg::LeafScanFinished { matched } => {
            if !state.is_active() {
                return (state, Vec::new());
            }
            match matched {
                Some(candidate) => found(&mut state, candidate, false),
                None => next_branch_or_finish(&mut state),
            }
        }
        Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

fn list_branches(state: &mut RunState, branches: Vec<Branch>) -> Vec<Effect> {
    state.remaining_branches.clear();
    let mut branches = branches.into_iter();
    let Some(first) = branches.next() else {
        return not_found(state);
    };
    let rest: Vec<Branch> = branches.collect();

    if rest.is_empty() {
        return advance(state, first);
    }
    match state.mode {
        RunMode::ScanAll => {
            state.current_branch = Some(first.clone());
            state.enqueue(rest);
            advance(state, first)
        }
        RunMode::Single => {
            let mut offered = Vec::with_capacity(rest.len() + 1);
            offered.push(first);
            offered.extend(rest);
            state.offer(offered.clone());
            vec![Effect::PersistRun, Effect::ExposeBranches(offered)]
        }
    }
}

fn advance(state: &mut RunState, branch: Branch) -> Vec<Effect> {
    let navigable_ref = branch.navigable_ref.clone();
    state.advance_to(branch);
    vec![Effect::PersistRun, Effect::Navigate { navigable_ref }]
}

fn next_branch_or_finish(state: &mut RunState) -> Vec<Effect> {
    if state.mode == RunMode::ScanAll {
        if let Some(next) = state.dequeue_next() {
            return advance(state, next);
        }
    }
    not_found(state)
}

fn found(state: &mut RunState, candidate: Candidate, from_cache: bool) -> Vec<Effect> {
    state.finish(RunStatus::Found);
    let label = match &state.current_branch {
        Some(branch) => format!("{} | {} | id {}", state.query, branch.label, candidate.id),
        None => format!("{} | id {}", state.query, candidate.id),
    };
    let label = if from_cache {
        format!("{label} (cached)")
    } else {
        label
    };

    let mut effects = Vec::with_capacity(4);
    if !from_cache {
        effects.push(Effect::RecordMatch {
            query: state.normalized_query(),
            candidate_id: candidate.id.clone(),
        });
    }
    effects.push(Effect::ClearRun);
    effects.push(Effect::Highlight {
        candidate,
        label: label.clone(),
    });
    effects.push(Effect::RecordOutcome(RunOutcome { found: true, label }));
    effects
}

fn not_found(state: &mut RunState) -> Vec<Effect> {
    state.finish(RunStatus::NotFound);
    vec![
        Effect::ClearRun,
        Effect::RecordOutcome(RunOutcome {
            found: false,
            label: String::new(),
        }),
    ]
}
