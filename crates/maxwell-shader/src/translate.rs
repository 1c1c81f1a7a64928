//! Whole-pipeline entry points and the translated-shader cache.

use std::collections::HashMap;

use blake3::Hash;

use crate::backend::{self, BackendKind};
use crate::error::Result;
use crate::frontend::{translate_program, BytesEnvironment, CfgBlock, Environment};
use crate::ir::{Info, Stage};
use crate::opt;
use crate::profile::Profile;

/// Successful recompilation result.
#[derive(Debug, Clone)]
pub struct RecompiledShader {
    /// Target-language text ready for the host driver.
    pub code: String,
    /// Resource usage summary for host pipeline state.
    pub info: Info,
    pub stage: Stage,
}

/// Runs the full pipeline: translate, rewrite into SSA, collect resource
/// info, then lower with the selected backend.
pub fn recompile(
    env: &impl Environment,
    cfg: &[CfgBlock],
    stage: Stage,
    profile: &Profile,
    backend: BackendKind,
) -> Result<RecompiledShader> {
    let mut program = translate_program(env, cfg, stage)?;
    opt::run_passes(&mut program)?;
    let code = backend::emit(backend, &program, profile)?;
    tracing::debug!(?stage, code_bytes = code.len(), "recompiled shader");
    Ok(RecompiledShader {
        code,
        info: program.info.clone(),
        stage,
    })
}

#[derive(Debug, Clone)]
pub struct CachedShader {
    pub hash: Hash,
    pub recompiled: RecompiledShader,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLookupSource {
    /// The shader was already present in the in-memory cache.
    Memory,
    /// The pipeline ran and the output was inserted into the cache.
    Recompiled,
}

/// In-memory cache of recompiled shaders keyed by instruction bytes.
///
/// Changing the profile or backend invalidates everything: the emitted text
/// depends on both.
pub struct ShaderCache {
    map: HashMap<Hash, CachedShader>,
    profile: Profile,
    backend: BackendKind,
}

impl ShaderCache {
    pub fn new(profile: Profile, backend: BackendKind) -> Self {
        Self {
            map: HashMap::new(),
            profile,
            backend,
        }
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn set_profile(&mut self, profile: Profile) {
        if self.profile != profile {
            self.profile = profile;
            self.map.clear();
        }
    }

    /// Looks up the shader with the given little-endian instruction bytes,
    /// recompiling on miss.
    pub fn get_or_recompile(
        &mut self,
        bytes: &[u8],
        cfg: &[CfgBlock],
        stage: Stage,
    ) -> Result<(CacheLookupSource, &CachedShader)> {
        use std::collections::hash_map::Entry;

        let hash = blake3::hash(bytes);
        match self.map.entry(hash) {
            Entry::Occupied(entry) => Ok((CacheLookupSource::Memory, entry.into_mut())),
            Entry::Vacant(entry) => {
                let env = BytesEnvironment::new(bytes);
                let recompiled = recompile(&env, cfg, stage, &self.profile, self.backend)?;
                Ok((
                    CacheLookupSource::Recompiled,
                    entry.insert(CachedShader { hash, recompiled }),
                ))
            }
        }
    }
}

impl Default for ShaderCache {
    fn default() -> Self {
        Self::new(Profile::default(), BackendKind::default())
    }
}
