//! Rewrite driver - runs every job in dependency order.
//!
//! Jobs advance `Pending -> InProgress -> Done`. Processing a job loads its
//! module, recursively processes any referenced job that is not yet done,
//! patches this module's references to the renamed dependency, rewrites its
//! own symbols and identity, and finally commits the output. Only a
//! committed (`Done`) job short-circuits re-entry, so the job graph is
//! assumed acyclic.

use crate::codec;
use crate::commit;
use crate::event::{RenameEvent, RenameSink, SymbolKind, TracingSink};
use crate::job::{JobState, RewriteJob};
use crate::module::Module;
use crate::rename::RenameTable;
use crate::resolver::ModuleResolver;
use crate::walker::Walker;
use crate::Result;
use std::path::PathBuf;

pub struct RewriteDriver {
    jobs: Vec<RewriteJob>,
    table: RenameTable,
    resolver: ModuleResolver,
}

impl RewriteDriver {
    /// Build a driver from rewrite jobs plus extra resolve directories.
    ///
    /// The rename table is built once from the full job set. Module lookups
    /// search every job's input and output directory before the extras.
    pub fn new(jobs: Vec<RewriteJob>, resolve_dirs: &[PathBuf]) -> Result<Self> {
        let table = RenameTable::from_pairs(
            jobs.iter()
                .map(|job| (job.input_ident.clone(), job.output_ident.clone())),
        )?;

        let mut directories = Vec::new();
        for job in &jobs {
            if let Some(dir) = job.input_path.parent() {
                directories.push(dir.to_path_buf());
            }
        }
        for job in &jobs {
            if let Some(dir) = job.output_path.parent() {
                directories.push(dir.to_path_buf());
            }
        }
        directories.extend(resolve_dirs.iter().cloned());

        Ok(Self {
            jobs,
            table,
            resolver: ModuleResolver::new(directories),
        })
    }

    pub fn jobs(&self) -> &[RewriteJob] {
        &self.jobs
    }

    /// Rewrite every job, logging rename events through `tracing`.
    pub fn run(&mut self) -> Result<()> {
        let mut sink = TracingSink;
        self.run_with_sink(&mut sink)
    }

    /// Rewrite every job in declaration order, reporting renames to `sink`.
    pub fn run_with_sink(&mut self, sink: &mut dyn RenameSink) -> Result<()> {
        tracing::debug!("rename table has {} pairs", self.table.len());
        for index in 0..self.jobs.len() {
            self.process_job(index, sink)?;
        }
        Ok(())
    }

    fn process_job(&mut self, index: usize, sink: &mut dyn RenameSink) -> Result<()> {
        if self.jobs[index].is_done() {
            return Ok(());
        }
        self.jobs[index].state = JobState::InProgress;

        let input_path = self.jobs[index].input_path.clone();
        let output_path = self.jobs[index].output_path.clone();
        tracing::info!(
            "rewriting {} from {}",
            self.jobs[index].input_ident,
            input_path.display()
        );

        let mut module = codec::load(&input_path, &self.resolver)?;
        let current_name = module.name.clone();

        for ref_index in 0..module.references.len() {
            let ref_name = module.references[ref_index].name.clone();
            tracing::debug!("{} references {}", current_name, ref_name);

            let Some(dep_index) = self
                .jobs
                .iter()
                .position(|job| job.input_ident == ref_name)
            else {
                continue;
            };
            if self.jobs[dep_index].is_done() {
                tracing::debug!("{} already rewritten", ref_name);
            } else {
                tracing::info!("{} will be rewritten first", ref_name);
                self.process_job(dep_index, sink)?;
            }

            // patch every reference to the renamed dependency
            let mut walker = Walker::new(&self.table, &current_name, sink);
            walker.sweep_type_refs(&mut module);
            walker.walk_types(&mut module);

            let renamed = self.jobs[dep_index].output_ident.clone();
            sink.record(RenameEvent {
                module: current_name.clone(),
                kind: SymbolKind::ModuleReference,
                before: ref_name,
                after: renamed.clone(),
            });
            module.references[ref_index].name = renamed;
        }

        // the module's own symbols
        let mut walker = Walker::new(&self.table, &current_name, sink);
        walker.sweep_type_refs(&mut module);
        walker.walk_types(&mut module);

        self.rewrite_identity(&mut module, index, sink);

        commit::commit_module(module, &input_path, &output_path)?;
        self.jobs[index].state = JobState::Done;
        tracing::info!(
            "finished rewriting {} into {}",
            current_name,
            output_path.display()
        );
        Ok(())
    }

    /// Rewrite the human-readable title and set the machine identifier.
    fn rewrite_identity(&self, module: &mut Module, index: usize, sink: &mut dyn RenameSink) {
        let job = &self.jobs[index];

        let replaced = module.title.replace(&job.input_ident, &job.output_ident);
        let title = if replaced == module.title {
            // the old identifier never occurred; disambiguate anyway
            format!("{} ({})", module.title, job.output_ident)
        } else {
            replaced
        };
        sink.record(RenameEvent {
            module: module.name.clone(),
            kind: SymbolKind::Identity,
            before: module.title.clone(),
            after: title.clone(),
        });
        module.title = title;

        sink.record(RenameEvent {
            module: module.name.clone(),
            kind: SymbolKind::Identity,
            before: module.name.clone(),
            after: job.output_ident.clone(),
        });
        module.name = job.output_ident.clone();
    }
}
