//! Dependency graph construction.
//!
//! The builder walks a growing worklist instead of recursing: every compiled module
//! is appended to one `Vec`, and a cursor moves over it while new dependencies are
//! pushed onto the end. A set of already discovered identifiers keeps each module
//! from being compiled twice, which also makes import cycles terminate.

use std::collections::btree_map;
use std::collections::{BTreeMap, HashSet};

use log::{debug, info};
use serde::Serialize;

use crate::error::BundleResult;
use crate::loader::SourceLoader;
use crate::resolver::ModuleId;
use crate::transform::{ImportTable, SourceTransform};

/// One module after compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledModule {
    pub id: ModuleId,
    pub imports: ImportTable,
    pub body: String,
}

/// What the module table stores per identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleRecord {
    #[serde(rename = "dependencies")]
    pub imports: ImportTable,
    #[serde(rename = "code")]
    pub body: String,
}

/// Every module of a build, keyed by identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ModuleTable {
    modules: BTreeMap<ModuleId, ModuleRecord>,
}

impl ModuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a module, replacing any previous entry for the same identifier.
    pub fn insert(&mut self, module: CompiledModule) {
        self.modules.insert(
            module.id,
            ModuleRecord {
                imports: module.imports,
                body: module.body,
            },
        );
    }

    pub fn get(&self, id: &str) -> Option<&ModuleRecord> {
        self.modules.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.modules.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ModuleId> {
        self.modules.keys()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, ModuleId, ModuleRecord> {
        self.modules.iter()
    }

    /// Finds an import cycle reachable from `entry`.
    ///
    /// The returned path starts and ends with the same identifier. The search keeps
    /// an explicit stack, so deep graphs do not grow the call stack.
    pub fn find_cycle(&self, entry: &ModuleId) -> Option<Vec<ModuleId>> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            Active,
            Done,
        }

        let mut marks: BTreeMap<&ModuleId, Mark> = BTreeMap::new();
        let mut path: Vec<&ModuleId> = Vec::new();
        let mut stack: Vec<(&ModuleId, Vec<&ModuleId>)> = Vec::new();

        let (entry, _) = self.modules.get_key_value(entry)?;
        marks.insert(entry, Mark::Active);
        path.push(entry);
        stack.push((entry, self.targets_of(entry)));

        while let Some((id, pending)) = stack.last_mut() {
            let Some(next) = pending.pop() else {
                marks.insert(*id, Mark::Done);
                path.pop();
                stack.pop();
                continue;
            };

            match marks.get(next) {
                Some(Mark::Active) => {
                    let start = path.iter().position(|step| *step == next).unwrap_or(0);
                    let mut cycle: Vec<ModuleId> =
                        path[start..].iter().map(|step| (*step).clone()).collect();
                    cycle.push(next.clone());
                    return Some(cycle);
                }
                Some(Mark::Done) => {}
                None => {
                    if let Some((next, _)) = self.modules.get_key_value(next) {
                        marks.insert(next, Mark::Active);
                        path.push(next);
                        stack.push((next, self.targets_of(next)));
                    }
                }
            }
        }
        None
    }

    fn targets_of(&self, id: &ModuleId) -> Vec<&ModuleId> {
        self.modules
            .get(id)
            .map(|record| record.imports.targets().collect())
            .unwrap_or_default()
    }
}

impl FromIterator<CompiledModule> for ModuleTable {
    fn from_iter<I: IntoIterator<Item = CompiledModule>>(iter: I) -> Self {
        let mut table = ModuleTable::new();
        for module in iter {
            table.insert(module);
        }
        table
    }
}

impl<'a> IntoIterator for &'a ModuleTable {
    type Item = (&'a ModuleId, &'a ModuleRecord);
    type IntoIter = btree_map::Iter<'a, ModuleId, ModuleRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Builds the module table reachable from an entry module.
pub struct GraphBuilder<T, L> {
    transform: T,
    loader: L,
}

impl<T: SourceTransform, L: SourceLoader> GraphBuilder<T, L> {
    pub fn new(transform: T, loader: L) -> Self {
        Self { transform, loader }
    }

    /// Compiles one module: load, parse, collect imports, lower.
    pub fn compile(&self, id: &ModuleId) -> BundleResult<CompiledModule> {
        let source = self.loader.load(id)?;
        let tree = self.transform.parse(id, &source)?;
        let imports = self.transform.collect_imports(&tree, id);
        let body = self.transform.lower(id, &tree)?;
        debug!("Compiled {} ({} imports)", id, imports.len());

        Ok(CompiledModule {
            id: id.clone(),
            imports,
            body,
        })
    }

    /// Discovers and compiles every module reachable from `entry`.
    ///
    /// Any load or compile failure aborts the whole build.
    pub fn build(&self, entry: &ModuleId) -> BundleResult<ModuleTable> {
        let mut discovered: HashSet<ModuleId> = HashSet::new();
        discovered.insert(entry.clone());
        let mut worklist = vec![self.compile(entry)?];

        // The bound is re-read every step: modules appended below are visited too.
        let mut cursor = 0;
        while cursor < worklist.len() {
            let importer = worklist[cursor].id.clone();
            let targets: Vec<ModuleId> = worklist[cursor].imports.targets().cloned().collect();
            for target in targets {
                if !discovered.insert(target.clone()) {
                    continue;
                }
                let module = self
                    .compile(&target)
                    .map_err(|err| err.imported_by(&importer))?;
                worklist.push(module);
            }
            cursor += 1;
        }

        info!("Built module graph of {} modules from {}", worklist.len(), entry);
        Ok(worklist.into_iter().collect())
    }
}
