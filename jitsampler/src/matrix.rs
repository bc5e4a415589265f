//! Sampler matrix
//!
//! One row per distinct [`StaticTextureState`], one column per distinct
//! [`StaticSamplerState`], and inside every cell a table of compiled
//! functions indexed by sample key. Draw-time code indexes straight into
//! these tables, so every registration eagerly warms the slots that the
//! currently active keys, samplers and image operations need.
//!
//! Rows and sampler columns are never freed individually. A row whose
//! ref count drops to zero keeps its compiled functions for later reuse;
//! everything is released together by [`SamplerMatrix::teardown`].

use std::sync::Arc;

use log::{debug, info, trace};
use once_cell::sync::OnceCell;
use rustc_hash::FxHashMap;

use crate::compiler::{CompiledFunction, CompilerStats, FunctionCompiler, FunctionDesc};
use crate::key::{ImageOpId, QueryKind, SampleKey, IMAGE_OP_COUNT, SAMPLE_KEY_COUNT};
use crate::state::{StaticSamplerState, StaticTextureState};

type Slot = OnceCell<Option<CompiledFunction>>;

/// Key-indexed array of compiled functions.
///
/// Storage is allocated on the first resolve. A slot is resolved at most
/// once; an unsupported combination stays `None` for good.
pub struct FunctionTable {
    len: usize,
    slots: OnceCell<Box<[Slot]>>,
}

impl FunctionTable {
    pub fn new(len: usize) -> Self {
        Self {
            len,
            slots: OnceCell::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_allocated(&self) -> bool {
        self.slots.get().is_some()
    }

    pub fn get(&self, index: usize) -> Option<CompiledFunction> {
        assert!(index < self.len, "function slot {} out of range ({})", index, self.len);
        self.slots
            .get()
            .and_then(|slots| slots[index].get().copied().flatten())
    }

    pub fn is_resolved(&self, index: usize) -> bool {
        assert!(index < self.len, "function slot {} out of range ({})", index, self.len);
        self.slots
            .get()
            .map_or(false, |slots| slots[index].get().is_some())
    }

    /// Number of slots holding a compiled function.
    pub fn compiled_count(&self) -> usize {
        self.slots.get().map_or(0, |slots| {
            slots.iter().filter(|slot| matches!(slot.get(), Some(Some(_)))).count()
        })
    }

    fn resolve(
        &self,
        index: usize,
        compile: impl FnOnce() -> Option<CompiledFunction>,
    ) -> Option<CompiledFunction> {
        let slots = self
            .slots
            .get_or_init(|| (0..self.len).map(|_| OnceCell::new()).collect());
        *slots[index].get_or_init(compile)
    }
}

/// Index of a texture row; stable for the lifetime of the matrix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RowId(u32);

impl RowId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureUsage {
    Sampled,
    Storage,
}

pub struct TextureRow {
    state: StaticTextureState,
    ref_count: u32,
    sampled: bool,
    storage: bool,
    /// One table per sampler column. Typeless rows alias `typeless_table`.
    sample_functions: Vec<Arc<FunctionTable>>,
    typeless_table: Option<Arc<FunctionTable>>,
    fetch_functions: FunctionTable,
    image_functions: FunctionTable,
    size_function: Slot,
    samples_function: Slot,
}

impl TextureRow {
    fn new(state: StaticTextureState, sampler_count: usize) -> Self {
        let typeless_table = state
            .is_typeless()
            .then(|| Arc::new(FunctionTable::new(SAMPLE_KEY_COUNT)));
        let sample_functions = (0..sampler_count)
            .map(|_| match &typeless_table {
                Some(shared) => shared.clone(),
                None => Arc::new(FunctionTable::new(SAMPLE_KEY_COUNT)),
            })
            .collect();

        Self {
            state,
            ref_count: 1,
            sampled: false,
            storage: false,
            sample_functions,
            typeless_table,
            fetch_functions: FunctionTable::new(SAMPLE_KEY_COUNT),
            image_functions: FunctionTable::new(IMAGE_OP_COUNT),
            size_function: OnceCell::new(),
            samples_function: OnceCell::new(),
        }
    }

    pub fn state(&self) -> &StaticTextureState {
        &self.state
    }

    pub fn ref_count(&self) -> u32 {
        self.ref_count
    }

    pub fn is_sampled(&self) -> bool {
        self.sampled
    }

    pub fn is_storage(&self) -> bool {
        self.storage
    }

    pub fn sampler_tables(&self) -> &[Arc<FunctionTable>] {
        &self.sample_functions
    }

    pub fn fetch_table(&self) -> &FunctionTable {
        &self.fetch_functions
    }

    pub fn image_table(&self) -> &FunctionTable {
        &self.image_functions
    }

    pub fn size_function(&self) -> Option<CompiledFunction> {
        self.size_function.get().copied().flatten()
    }

    pub fn samples_function(&self) -> Option<CompiledFunction> {
        self.samples_function.get().copied().flatten()
    }

    fn has_usage(&self, usage: TextureUsage) -> bool {
        match usage {
            TextureUsage::Sampled => self.sampled,
            TextureUsage::Storage => self.storage,
        }
    }

    fn is_warm_sampled(&self) -> bool {
        self.sampled && self.ref_count > 0
    }

    fn resolve_sample(
        &self,
        table: &FunctionTable,
        sampler: &StaticSamplerState,
        key: SampleKey,
        compiler: &mut FunctionCompiler,
    ) {
        table.resolve(key.index(), || {
            compiler.compile(FunctionDesc::Sample {
                texture: &self.state,
                sampler,
                key,
            })
        });
    }

    fn resolve_fetch(&self, key: SampleKey, compiler: &mut FunctionCompiler) {
        self.resolve_sample(&self.fetch_functions, &StaticSamplerState::DUMMY, key, compiler);
    }

    /// Warm one key for every sampler column (or the shared typeless table).
    fn warm_sample_key(
        &self,
        key: SampleKey,
        samplers: &[StaticSamplerState],
        compiler: &mut FunctionCompiler,
    ) {
        if key.is_sampler_independent() {
            self.resolve_fetch(key, compiler);
        } else if let Some(shared) = &self.typeless_table {
            self.resolve_sample(shared, &StaticSamplerState::DUMMY, key, compiler);
        } else {
            for (table, sampler) in self.sample_functions.iter().zip(samplers) {
                self.resolve_sample(table, sampler, key, compiler);
            }
        }
    }

    fn warm_sampler_column(
        &self,
        column: usize,
        sampler: &StaticSamplerState,
        keys: &[SampleKey],
        compiler: &mut FunctionCompiler,
    ) {
        let table = &self.sample_functions[column];
        for &key in keys.iter().filter(|key| !key.is_sampler_independent()) {
            self.resolve_sample(table, sampler, key, compiler);
        }
    }

    fn warm_sampled(
        &self,
        samplers: &[StaticSamplerState],
        keys: &[SampleKey],
        compiler: &mut FunctionCompiler,
    ) {
        for &key in keys {
            self.warm_sample_key(key, samplers, compiler);
        }
        self.warm_queries(compiler);
    }

    fn warm_storage(&self, image_ops: u64, compiler: &mut FunctionCompiler) {
        for op in ImageOpId::all().filter(|op| image_ops & op_bit(*op) != 0) {
            self.resolve_image_op(op, compiler);
        }
        self.warm_queries(compiler);
    }

    fn resolve_image_op(&self, op: ImageOpId, compiler: &mut FunctionCompiler) {
        self.image_functions.resolve(op.index(), || {
            compiler.compile(FunctionDesc::Image {
                texture: &self.state,
                op,
            })
        });
    }

    fn warm_queries(&self, compiler: &mut FunctionCompiler) {
        for (slot, kind) in [
            (&self.size_function, QueryKind::Size),
            (&self.samples_function, QueryKind::Samples),
        ] {
            slot.get_or_init(|| {
                compiler.compile(FunctionDesc::Query {
                    texture: &self.state,
                    kind,
                })
            });
        }
    }
}

fn op_bit(op: ImageOpId) -> u64 {
    1u64 << op.index()
}

fn active_keys(refcounts: &[u32]) -> Vec<SampleKey> {
    refcounts
        .iter()
        .enumerate()
        .filter(|(_, count)| **count > 0)
        .filter_map(|(index, _)| SampleKey::from_index(index))
        .collect()
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MatrixStats {
    pub textures: usize,
    pub samplers: usize,
    pub active_sample_keys: usize,
    pub active_image_ops: usize,
    pub compiler: CompilerStats,
}

/// Per-context cache of compiled sampling and image functions.
pub struct SamplerMatrix {
    textures: Vec<TextureRow>,
    texture_rows: FxHashMap<StaticTextureState, RowId>,
    samplers: Vec<StaticSamplerState>,
    sampler_columns: FxHashMap<StaticSamplerState, u32>,
    sample_key_refcounts: Box<[u32]>,
    image_ops: u64,
    compiler: FunctionCompiler,
}

impl SamplerMatrix {
    pub fn new(compiler: FunctionCompiler) -> Self {
        Self {
            textures: Vec::new(),
            texture_rows: FxHashMap::default(),
            samplers: Vec::new(),
            sampler_columns: FxHashMap::default(),
            sample_key_refcounts: vec![0; SAMPLE_KEY_COUNT].into_boxed_slice(),
            image_ops: 0,
            compiler,
        }
    }

    /// Add a reference to the row for `state`, creating it if needed, and
    /// warm every slot the active samplers, keys and image ops require.
    pub fn register_texture(&mut self, state: StaticTextureState, usage: TextureUsage) -> RowId {
        let (id, revived) = match self.texture_rows.get(&state) {
            Some(&id) => {
                let row = &mut self.textures[id.index()];
                let had_usage = row.has_usage(usage);
                let previous = row.ref_count;
                row.ref_count += 1;
                if had_usage && previous != 0 {
                    trace!("Texture row {:?} already warm for {:?}", id, usage);
                    return id;
                }
                (id, previous == 0)
            }
            None => {
                let id = RowId(self.textures.len() as u32);
                self.textures.push(TextureRow::new(state, self.samplers.len()));
                self.texture_rows.insert(state, id);
                debug!("New texture row {:?}: {:?}", id, state);
                (id, false)
            }
        };

        // A row coming back from zero references missed every key and
        // sampler activated meanwhile, for all usages it already carries.
        let row = &mut self.textures[id.index()];
        match usage {
            TextureUsage::Sampled => row.sampled = true,
            TextureUsage::Storage => row.storage = true,
        }
        if row.sampled && (revived || usage == TextureUsage::Sampled) {
            let keys = active_keys(&self.sample_key_refcounts);
            row.warm_sampled(&self.samplers, &keys, &mut self.compiler);
        }
        if row.storage && (revived || usage == TextureUsage::Storage) {
            row.warm_storage(self.image_ops, &mut self.compiler);
        }
        id
    }

    /// Drop one reference. The row and its functions stay cached.
    pub fn release_texture(&mut self, id: RowId) {
        let row = &mut self.textures[id.index()];
        assert!(row.ref_count > 0, "texture row {:?} released more often than registered", id);
        row.ref_count -= 1;
        trace!("Texture row {:?} ref count now {}", id, row.ref_count);
    }

    /// Return the column of `state`, appending it and warming every active
    /// sampled row if it is new.
    pub fn register_sampler(&mut self, state: StaticSamplerState) -> u32 {
        if let Some(&column) = self.sampler_columns.get(&state) {
            return column;
        }

        let column = self.samplers.len() as u32;
        self.samplers.push(state);
        self.sampler_columns.insert(state, column);
        debug!("New sampler column {}: {:?}", column, state);

        let keys = active_keys(&self.sample_key_refcounts);
        for row in &mut self.textures {
            let table = match &row.typeless_table {
                Some(shared) => shared.clone(),
                None => Arc::new(FunctionTable::new(SAMPLE_KEY_COUNT)),
            };
            row.sample_functions.push(table);

            if row.is_warm_sampled() && row.typeless_table.is_none() {
                row.warm_sampler_column(column as usize, &state, &keys, &mut self.compiler);
            }
        }
        column
    }

    pub fn register_sample_key(&mut self, key: SampleKey) {
        let count = &mut self.sample_key_refcounts[key.index()];
        *count += 1;
        if *count != 1 {
            return;
        }

        trace!("Sample key activated: {:?}", key);
        for row in self.textures.iter().filter(|row| row.is_warm_sampled()) {
            row.warm_sample_key(key, &self.samplers, &mut self.compiler);
        }
    }

    /// Compiled functions for the key stay cached after the last reference
    /// goes away.
    pub fn unregister_sample_key(&mut self, key: SampleKey) {
        let count = &mut self.sample_key_refcounts[key.index()];
        assert!(*count > 0, "sample key {:?} unregistered more often than registered", key);
        *count -= 1;
        if *count == 0 {
            trace!("Sample key deactivated: {:?}", key);
        }
    }

    /// Image ops are never deactivated.
    pub fn register_image_op(&mut self, op: ImageOpId) {
        let bit = op_bit(op);
        if self.image_ops & bit != 0 {
            return;
        }
        self.image_ops |= bit;

        trace!("Image op activated: {:?}", op);
        for row in self.textures.iter().filter(|row| row.storage) {
            row.resolve_image_op(op, &mut self.compiler);
        }
    }

    pub fn row(&self, id: RowId) -> &TextureRow {
        &self.textures[id.index()]
    }

    pub fn find_texture(&self, state: &StaticTextureState) -> Option<RowId> {
        self.texture_rows.get(state).copied()
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn sampler_count(&self) -> usize {
        self.samplers.len()
    }

    pub fn sampler_state(&self, column: u32) -> &StaticSamplerState {
        &self.samplers[column as usize]
    }

    pub fn sample_key_refcount(&self, key: SampleKey) -> u32 {
        self.sample_key_refcounts[key.index()]
    }

    pub fn is_image_op_active(&self, op: ImageOpId) -> bool {
        self.image_ops & op_bit(op) != 0
    }

    /// Draw-time lookup. Fetch keys ignore `sampler` and read the fetch table.
    pub fn sample_function(&self, id: RowId, sampler: u32, key: SampleKey) -> Option<CompiledFunction> {
        let row = self.row(id);
        if key.is_sampler_independent() {
            return row.fetch_functions.get(key.index());
        }
        let column = sampler as usize;
        assert!(
            column < row.sample_functions.len(),
            "sampler column {} out of range ({})",
            column,
            row.sample_functions.len()
        );
        row.sample_functions[column].get(key.index())
    }

    pub fn fetch_function(&self, id: RowId, key: SampleKey) -> Option<CompiledFunction> {
        self.row(id).fetch_functions.get(key.index())
    }

    pub fn image_function(&self, id: RowId, op: ImageOpId) -> Option<CompiledFunction> {
        self.row(id).image_functions.get(op.index())
    }

    pub fn size_function(&self, id: RowId) -> Option<CompiledFunction> {
        self.row(id).size_function()
    }

    pub fn samples_function(&self, id: RowId) -> Option<CompiledFunction> {
        self.row(id).samples_function()
    }

    pub fn compiler(&self) -> &FunctionCompiler {
        &self.compiler
    }

    pub fn stats(&self) -> MatrixStats {
        MatrixStats {
            textures: self.textures.len(),
            samplers: self.samplers.len(),
            active_sample_keys: self.sample_key_refcounts.iter().filter(|c| **c > 0).count(),
            active_image_ops: self.image_ops.count_ones() as usize,
            compiler: self.compiler.stats(),
        }
    }

    /// Release every row, then every JIT module. Row ids and function
    /// pointers handed out before are invalid afterwards.
    ///
    /// Sample key references belong to the registered shaders and are kept,
    /// so shaders may still be unregistered after teardown.
    pub fn teardown(&mut self) {
        let stats = self.stats();
        info!(
            "Sampler matrix teardown: {} textures, {} samplers, {} modules ({} bytes)",
            stats.textures, stats.samplers, stats.compiler.modules, stats.compiler.code_bytes
        );

        self.textures.clear();
        self.texture_rows.clear();
        self.samplers.clear();
        self.sampler_columns.clear();
        self.image_ops = 0;
        self.compiler.teardown();
    }
}

impl Drop for SamplerMatrix {
    fn drop(&mut self) {
        if !self.textures.is_empty() || self.compiler.stats().modules > 0 {
            self.teardown();
        }
    }
}
