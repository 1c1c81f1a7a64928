//! Host capability record consulted by the backends.

/// Input attribute component type as declared by the host pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GenericInputType {
    #[default]
    Float,
    SignedInt,
    UnsignedInt,
}

/// Capabilities and quirks of the host driver the emitted text targets.
///
/// Backends consult this record to select opcode variants; the frontend never
/// looks at it. A default profile describes a fully featured desktop host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub support_float16: bool,
    pub support_int64: bool,
    pub support_vertex_instance_id: bool,
    pub support_subgroup_vote: bool,
    pub support_viewport_index_layer: bool,
    /// Minimum alignment the host guarantees for storage buffer offsets.
    pub min_ssbo_alignment: u32,
    pub warp_size_potentially_larger_than_guest: bool,
    /// Component types of the 32 generic input attributes.
    pub generic_input_types: [GenericInputType; 32],
    pub has_broken_spirv_clamp: bool,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            support_float16: true,
            support_int64: true,
            support_vertex_instance_id: true,
            support_subgroup_vote: true,
            support_viewport_index_layer: true,
            min_ssbo_alignment: 16,
            warp_size_potentially_larger_than_guest: false,
            generic_input_types: [GenericInputType::Float; 32],
            has_broken_spirv_clamp: false,
        }
    }
}
