// src/file/serialize.rs
//
// The module file: header, pool section, primary module index and the child
// block of the file root.
//
// Assembly first materializes every lazy child block, then runs a
// registration pass over the live component tree so the pool only keeps what
// is reachable. When the pass compacts the pool, every stored index in the
// tree is rewritten through the returned remap.

use std::io::{Read, Write};

use rustc_hash::FxHashSet;
use strata_identity::{ComponentId, ConstantId};

use super::{FILE_MAGIC, FileStructure, VERSION_MAJOR, VERSION_MINOR};
use crate::codec::{ByteReader, ByteWriter};
use crate::component::children::ChildState;
use crate::component::{ComponentKind, Format};
use crate::constant::ConstantKind;
use crate::errors::format::at;
use crate::errors::{AsmError, FormatError, PoolError, render_to_string};
use crate::options::AssemblerOptions;
use crate::pool::{ConstantPool, ConstantRemap};

impl FileStructure {
    // ========================================================================
    // Assembly
    // ========================================================================

    /// Write the whole file to `out`.
    #[tracing::instrument(skip(self, out), fields(module = %self.module_name()))]
    pub fn assemble(&mut self, mut out: impl Write) -> Result<(), AsmError> {
        let bytes = self.to_bytes()?;
        out.write_all(&bytes)?;
        out.flush()?;
        Ok(())
    }

    /// Assemble into a byte vector.
    pub fn to_bytes(&mut self) -> Result<Vec<u8>, AsmError> {
        self.ensure_all_children()?;
        let live = self.live_components();

        self.pool.begin_recursive_registration()?;
        for &id in &live {
            for constant in self.component(id).constants() {
                self.pool.mark_referenced(constant);
            }
        }
        let remap = self.pool.end_recursive_registration(self.options.optimize_on_assemble)?;
        if let Some(remap) = remap {
            self.apply_remap(&live, &remap)?;
        }

        let mut out = ByteWriter::new();
        out.write_u32(FILE_MAGIC);
        out.write_u16(VERSION_MAJOR);
        out.write_u16(VERSION_MINOR);
        self.pool.write_to(&mut out)?;
        // the root carries the primary module's identity and is always live
        out.write_id(self.component(self.root).identity);
        self.write_child_block(self.root, &mut out);

        tracing::debug!(
            bytes = out.len(),
            constants = self.pool.len(),
            components = live.len(),
            "assembled module file"
        );
        Ok(out.into_bytes())
    }

    /// Every component reachable from the root, siblings included.
    fn live_components(&self) -> Vec<ComponentId> {
        let mut out = Vec::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            out.push(id);
            if let Some(map) = self.parsed_children(id) {
                for child in map.ids() {
                    stack.extend(self.siblings(child));
                }
            }
        }
        out
    }

    /// Rewrite every constant index stored by the live tree after the pool
    /// was compacted.
    fn apply_remap(&mut self, live: &[ComponentId], remap: &ConstantRemap) -> Result<(), PoolError> {
        let mut slots = FxHashSet::default();
        for &id in live {
            let mapped = self.component(id).try_map_constants(&mut |old: ConstantId| {
                remap
                    .get(old)
                    .ok_or(PoolError::DanglingReference { index: old.index() })
            })?;
            slots.extend(mapped.children);
            *self.component_mut(id) = mapped;
        }
        for slot in slots {
            if let ChildState::Parsed(map) = &mut self.slots[slot.as_usize()].state {
                map.map_signatures(|sig| remap.apply(sig));
            }
        }

        // cached relation answers name the old positions
        self.relating.clear();
        self.scanning.clear();
        tracing::debug!(
            dropped = remap.dropped(),
            kept = self.pool.len(),
            "remapped component constants"
        );
        Ok(())
    }

    // ========================================================================
    // Disassembly
    // ========================================================================

    /// Read a whole file from `input`.
    #[tracing::instrument(skip(input, options))]
    pub fn disassemble(mut input: impl Read, options: AssemblerOptions) -> Result<FileStructure, AsmError> {
        let mut bytes = Vec::new();
        input.read_to_end(&mut bytes)?;
        Self::from_bytes(&bytes, options)
    }

    /// Read a file from its bytes. With lazy children only the top-level
    /// modules are parsed; every deeper child block is kept as raw bytes.
    pub fn from_bytes(bytes: &[u8], options: AssemblerOptions) -> Result<FileStructure, AsmError> {
        Self::read_file(bytes, options).inspect_err(|err| {
            tracing::warn!(size = bytes.len(), "rejected module file\n{}", render_to_string(err));
        })
    }

    fn read_file(bytes: &[u8], options: AssemblerOptions) -> Result<FileStructure, AsmError> {
        let mut input = ByteReader::new(bytes);
        let found = input.read_u32()?;
        if found != FILE_MAGIC {
            return Err(FormatError::BadMagic { found }.into());
        }
        let major = input.read_u16()?;
        let minor = input.read_u16()?;
        if major != VERSION_MAJOR || minor != VERSION_MINOR {
            return Err(FormatError::UnsupportedVersion {
                major,
                minor,
                expected_major: VERSION_MAJOR,
                expected_minor: VERSION_MINOR,
            }
            .into());
        }

        let pool = ConstantPool::read_from(&mut input, options.core_module)?;
        let identity = pool.read_ref(&mut input)?;
        if !matches!(pool.get(identity), ConstantKind::Module { .. }) {
            return Err(FormatError::WrongConstantKind {
                index: identity.index(),
                expected: "module",
                found: pool.get(identity).format().name().to_string(),
            }
            .into());
        }

        let mut file = FileStructure::empty(pool, identity, options);
        let length = input.read_magnitude()?;
        let start = input.position();
        let block = input.read_bytes(length)?;
        if !input.is_empty() {
            return Err(FormatError::TrailingBytes {
                count: input.remaining(),
                span: at(input.position()),
            }
            .into());
        }

        let root = file.root;
        if length > 0 {
            let map = file.read_child_block(block, start, root)?;
            let slot = file.alloc_slot(root, ChildState::Parsed(map));
            file.component_mut(root).children = Some(slot);
        }

        let name = file.pool.name_of(identity).unwrap_or("").to_owned();
        let module = file
            .get_child(root, &name, None)
            .first()
            .filter(|&m| file.component(m).format() == Format::Module)
            .ok_or(FormatError::MissingPrimaryModule { name: name.clone() })?;
        file.module = module;
        file.restore_version_labels();

        tracing::debug!(
            module = %name,
            constants = file.pool.len(),
            versions = file.versions.len(),
            "disassembled module file"
        );
        Ok(file)
    }

    /// Rebuild the version tree from what the primary module stores: the
    /// version terms of its condition, or else its module version.
    fn restore_version_labels(&mut self) {
        let module = self.component(self.module);
        let mut labels = module
            .condition
            .map(|c| self.pool.condition_versions(c))
            .unwrap_or_default();
        if labels.is_empty()
            && let ComponentKind::Module(data) = &module.kind
            && let Some(version) = data.version.and_then(|v| self.pool.version_of(v))
        {
            labels.push(version.clone());
        }
        for label in labels {
            self.versions.put(label, ());
        }
    }
}
