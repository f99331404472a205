//! The symbol collector (§4.2): a per-file accumulator of branch and tag
//! definitions that feeds the global symbol statistics store.

use std::{collections::HashMap, str::FromStr};

use comma_v::Num;
use thiserror::Error;

use crate::{config::Config, revnum};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("symbol {0:?} is defined more than once in this file")]
    DuplicateSymbol(String),
}

/// Running counts and blockers for every symbol seen across the batch.
#[derive(Debug, Default, Clone)]
pub struct SymbolStats {
    counts: HashMap<String, SymbolCounts>,
    /// (branch name, blocking symbol name) pairs: a blocker prevents the
    /// branch from being retrograded to a tag.
    blockers: Vec<(String, String)>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SymbolCounts {
    pub branch_creations: u64,
    pub branch_commits: u64,
    pub tag_creations: u64,
}

impl SymbolStats {
    fn entry(&mut self, name: &str) -> &mut SymbolCounts {
        self.counts.entry(name.to_string()).or_default()
    }

    pub fn counts_for(&self, name: &str) -> SymbolCounts {
        self.counts.get(name).copied().unwrap_or_default()
    }

    pub fn blockers(&self) -> &[(String, String)] {
        &self.blockers
    }

    /// Symbols that were only ever seen as tags, and never blocked, so
    /// they can't be confused with a branch that should stay a branch.
    pub fn possible_tags(&self) -> Vec<&str> {
        self.counts
            .iter()
            .filter(|(_, c)| c.tag_creations > 0 && c.branch_creations == 0)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn possible_branches(&self) -> Vec<&str> {
        self.counts
            .iter()
            .filter(|(_, c)| c.branch_creations > 0)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn symbol_names(&self) -> impl Iterator<Item = &str> {
        self.counts.keys().map(String::as_str)
    }
}

/// Per-file accumulator of branch and tag definitions (§4.2).
#[derive(Debug)]
pub struct SymbolCollector<'a> {
    config: &'a Config,
    stats: &'a mut SymbolStats,
    tags: HashMap<String, Num>,
    branches: HashMap<String, Num>,
    branches_by_number: HashMap<Num, String>,
}

impl<'a> SymbolCollector<'a> {
    pub fn new(config: &'a Config, stats: &'a mut SymbolStats) -> Self {
        Self {
            config,
            stats,
            tags: HashMap::new(),
            branches: HashMap::new(),
            branches_by_number: HashMap::new(),
        }
    }

    /// Defines a symbol from the archive's symbol header. `raw_revnum` is
    /// classified as a branch (odd-length, >= 3 components after
    /// normalization) or a tag.
    pub fn define_symbol(&mut self, raw_name: &str, raw_revnum: &str) -> Result<(), Error> {
        let name = self.config.apply_symbol_transforms(raw_name);
        let normalized = revnum::normalize_branch_number(raw_revnum);

        if self.tags.contains_key(&name) || self.branches.contains_key(&name) {
            return Err(Error::DuplicateSymbol(name));
        }

        let num = match Num::from_str(&normalized) {
            Ok(num) => num,
            Err(_) => {
                log::warn!("symbol {:?} has an unparseable revision {:?}", name, raw_revnum);
                return Ok(());
            }
        };

        if revnum::is_branch_number(&num) {
            self.define_branch(name, num);
        } else {
            self.tags.insert(name.clone(), num);
            self.stats.entry(&name).tag_creations += 1;
        }

        Ok(())
    }

    fn define_branch(&mut self, name: String, number: Num) {
        if let Some(existing_name) = self.branches_by_number.get(&number) {
            if existing_name != &name {
                log::warn!(
                    "branch number {} already has name {:?}; ignoring second name {:?}",
                    number,
                    existing_name,
                    name
                );
            }
            return;
        }

        self.branches_by_number.insert(number.clone(), name.clone());
        self.stats.entry(&name).branch_creations += 1;
        self.branches.insert(name, number);
    }

    /// Looks up the name of the branch with the given number, synthesizing
    /// `unlabeled-<branch_number>` on first reference if the archive never
    /// named it explicitly.
    pub fn resolve_branch_name(&mut self, number: &Num) -> String {
        if let Some(name) = self.branches_by_number.get(number) {
            return name.clone();
        }

        let name = format!("unlabeled-{}", number);
        log::debug!("synthesizing name {:?} for unlabeled branch {}", name, number);
        self.branches_by_number.insert(number.clone(), name.clone());
        self.branches.insert(name.clone(), number.clone());
        self.stats.entry(&name).branch_creations += 1;
        name
    }

    /// Registers a commit on the named branch.
    pub fn register_commit(&mut self, branch_name: &str) {
        self.stats.entry(branch_name).branch_commits += 1;
    }

    pub fn tag_revision(&self, name: &str) -> Option<&Num> {
        self.tags.get(name)
    }

    pub fn branch_number(&self, name: &str) -> Option<&Num> {
        self.branches.get(name)
    }

    pub fn tags(&self) -> impl Iterator<Item = (&String, &Num)> {
        self.tags.iter()
    }

    pub fn tag_names_for(&self, revision: &Num) -> Vec<String> {
        self.tags
            .iter()
            .filter(|(_, num)| *num == revision)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Finalizer: registers every blocker implied by the symbols
    /// collected in this file.
    ///
    /// A tag attached to a branch revision blocks that branch from being
    /// retrograded to a tag. A branch whose parent revision is itself on
    /// a branch is blocked by that parent branch.
    pub fn register_branch_blockers(&mut self) {
        for (tag_name, tag_revision) in &self.tags {
            if let Some(owning_branch) = revnum::branch_number_of(tag_revision)
                .and_then(|number| self.branches_by_number.get(&number))
            {
                self.stats
                    .blockers
                    .push((owning_branch.clone(), tag_name.clone()));
            }
        }

        for (branch_name, branch_number) in &self.branches {
            if let Some(parent_revision) = revnum::parent_of_branch_number(branch_number) {
                if revnum::is_branch_revision(&parent_revision) {
                    if let Some(parent_branch_number) = revnum::branch_number_of(&parent_revision)
                    {
                        if let Some(parent_branch_name) =
                            self.branches_by_number.get(&parent_branch_number)
                        {
                            self.stats
                                .blockers
                                .push((parent_branch_name.clone(), branch_name.clone()));
                        }
                    }
                }
            }
        }
    }
}
