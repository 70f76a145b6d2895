// SPDX-License-Identifier: GPL-3.0-only

//! Headless rasterizer
//!
//! Compiles WGSL with naga (parse + validate), resolves attribute and uniform
//! names from the parsed module, tracks pipeline state the way a GL context
//! would, and records every draw call instead of rasterizing. Used by the
//! `simulate` command and by tests that check what the renderer asked for.

use super::{
    AttribLocation, BufferId, BufferKind, Primitive, ProgramId, Rasterizer, TextureId,
    UniformLocation,
};
use crate::errors::{RenderError, RenderResult};
use std::collections::HashMap;
use tracing::{debug, info};

/// Introspected program interface
#[derive(Debug, Clone, Default)]
struct ProgramInfo {
    label: String,
    /// Vertex inputs by name → @location
    attributes: HashMap<String, u32>,
    /// Uniform block members and resource globals by name
    uniforms: HashMap<String, u32>,
}

#[derive(Debug, Clone)]
struct Buffer {
    kind: BufferKind,
    len: usize,
}

/// Where an enabled attribute reads from
#[derive(Debug, Clone, PartialEq)]
enum AttribSource {
    Buffer { buffer: BufferId, components: u32 },
    Client { data: Vec<f32>, components: u32 },
}

/// Recorded uniform value
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Mat4([f32; 16]),
    Vec4([f32; 4]),
}

/// Snapshot of pipeline state at a draw call
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub program: ProgramId,
    pub label: String,
    pub primitive: Primitive,
    pub count: u32,
    pub indexed: bool,
    pub depth_test: bool,
    pub depth_write: bool,
    pub texture: Option<TextureId>,
    /// Client-side attribute data bound at draw time, by attribute name
    pub client_attributes: HashMap<String, Vec<f32>>,
    /// Uniform values of the program at draw time, by name
    pub uniforms: HashMap<String, UniformValue>,
}

/// Rasterizer that validates and records instead of drawing
#[derive(Debug)]
pub struct HeadlessRasterizer {
    next_id: u32,
    programs: HashMap<ProgramId, ProgramInfo>,
    buffers: HashMap<BufferId, Buffer>,
    textures: Vec<TextureId>,
    current_program: Option<ProgramId>,
    bound_texture: Option<TextureId>,
    depth_test: bool,
    depth_write: bool,
    clear_color: [f32; 4],
    viewport: (u32, u32),
    attribs: HashMap<u32, AttribSource>,
    uniform_values: HashMap<(ProgramId, u32), UniformValue>,
    clears: u32,
    draws: Vec<DrawCall>,
}

impl Default for HeadlessRasterizer {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessRasterizer {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            programs: HashMap::new(),
            buffers: HashMap::new(),
            textures: Vec::new(),
            current_program: None,
            bound_texture: None,
            // GL default state
            depth_test: false,
            depth_write: true,
            clear_color: [0.0; 4],
            viewport: (0, 0),
            attribs: HashMap::new(),
            uniform_values: HashMap::new(),
            clears: 0,
            draws: Vec::new(),
        }
    }

    fn issue_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Draw calls recorded so far
    pub fn draw_calls(&self) -> &[DrawCall] {
        &self.draws
    }

    /// Drain recorded draw calls
    pub fn take_draw_calls(&mut self) -> Vec<DrawCall> {
        std::mem::take(&mut self.draws)
    }

    /// Number of `clear` calls
    pub fn clear_count(&self) -> u32 {
        self.clears
    }

    pub fn depth_test_enabled(&self) -> bool {
        self.depth_test
    }

    pub fn depth_write_enabled(&self) -> bool {
        self.depth_write
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    pub fn clear_color(&self) -> [f32; 4] {
        self.clear_color
    }

    pub fn program_count(&self) -> usize {
        self.programs.len()
    }

    fn program(&self, program: ProgramId) -> RenderResult<&ProgramInfo> {
        self.programs
            .get(&program)
            .ok_or(RenderError::InvalidHandle("program"))
    }

    fn current(&self) -> RenderResult<(ProgramId, &ProgramInfo)> {
        let id = self.current_program.ok_or(RenderError::NotInitialized)?;
        Ok((id, self.program(id)?))
    }

    /// Check that every attribute the program declares is fed with enough data
    fn check_attributes(&self, info: &ProgramInfo, vertex_count: u32) -> RenderResult<()> {
        for (name, location) in &info.attributes {
            let source = self
                .attribs
                .get(location)
                .ok_or_else(|| RenderError::MissingAttribute(name.clone()))?;
            let available = match source {
                AttribSource::Buffer { buffer, components } => {
                    let buffer = self
                        .buffers
                        .get(buffer)
                        .ok_or(RenderError::InvalidHandle("buffer"))?;
                    buffer.len / std::mem::size_of::<f32>() / (*components).max(1) as usize
                }
                AttribSource::Client { data, components } => {
                    data.len() / (*components).max(1) as usize
                }
            };
            if available < vertex_count as usize {
                return Err(RenderError::MissingAttribute(format!(
                    "{} ({} vertices supplied, {} needed)",
                    name, available, vertex_count
                )));
            }
        }
        Ok(())
    }

    fn record(&mut self, primitive: Primitive, count: u32, indexed: bool) -> RenderResult<()> {
        let (program, info) = self.current()?;

        let client_attributes = info
            .attributes
            .iter()
            .filter_map(|(name, location)| match self.attribs.get(location) {
                Some(AttribSource::Client { data, .. }) => Some((name.clone(), data.clone())),
                _ => None,
            })
            .collect();

        let uniforms = info
            .uniforms
            .iter()
            .filter_map(|(name, location)| {
                self.uniform_values
                    .get(&(program, *location))
                    .map(|value| (name.clone(), value.clone()))
            })
            .collect();

        let call = DrawCall {
            program,
            label: info.label.clone(),
            primitive,
            count,
            indexed,
            depth_test: self.depth_test,
            depth_write: self.depth_write,
            texture: self.bound_texture,
            client_attributes,
            uniforms,
        };
        self.draws.push(call);
        Ok(())
    }
}

/// Parse and validate WGSL, then collect the program interface
fn compile_wgsl(label: &str, source: &str) -> RenderResult<ProgramInfo> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| {
        RenderError::ShaderCompilation {
            label: label.to_string(),
            message: e.emit_to_string(source),
        }
    })?;

    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|e| RenderError::ShaderCompilation {
        label: label.to_string(),
        message: e.as_inner().to_string(),
    })?;

    let mut info = ProgramInfo {
        label: label.to_string(),
        ..Default::default()
    };

    let vertex = module
        .entry_points
        .iter()
        .find(|ep| ep.stage == naga::ShaderStage::Vertex)
        .ok_or_else(|| RenderError::ShaderCompilation {
            label: label.to_string(),
            message: "no vertex entry point".to_string(),
        })?;
    if !module
        .entry_points
        .iter()
        .any(|ep| ep.stage == naga::ShaderStage::Fragment)
    {
        return Err(RenderError::ShaderCompilation {
            label: label.to_string(),
            message: "no fragment entry point".to_string(),
        });
    }

    for argument in &vertex.function.arguments {
        match (&argument.binding, &argument.name) {
            (Some(naga::Binding::Location { location, .. }), Some(name)) => {
                info.attributes.insert(name.clone(), *location);
            }
            (None, _) => {
                // Struct-typed input: its members carry the bindings
                if let naga::TypeInner::Struct { members, .. } = &module.types[argument.ty].inner {
                    for member in members {
                        if let (Some(naga::Binding::Location { location, .. }), Some(name)) =
                            (&member.binding, &member.name)
                        {
                            info.attributes.insert(name.clone(), *location);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    let mut next_uniform = 0u32;
    for (_, global) in module.global_variables.iter() {
        match global.space {
            naga::AddressSpace::Uniform => {
                if let naga::TypeInner::Struct { members, .. } = &module.types[global.ty].inner {
                    for member in members {
                        if let Some(name) = &member.name {
                            info.uniforms.insert(name.clone(), next_uniform);
                            next_uniform += 1;
                        }
                    }
                } else if let Some(name) = &global.name {
                    info.uniforms.insert(name.clone(), next_uniform);
                    next_uniform += 1;
                }
            }
            naga::AddressSpace::Handle => {
                if let Some(name) = &global.name {
                    info.uniforms.insert(name.clone(), next_uniform);
                    next_uniform += 1;
                }
            }
            _ => {}
        }
    }

    debug!(
        label,
        attributes = info.attributes.len(),
        uniforms = info.uniforms.len(),
        "Compiled program"
    );
    Ok(info)
}

impl Rasterizer for HeadlessRasterizer {
    fn set_clear_color(&mut self, rgba: [f32; 4]) {
        self.clear_color = rgba;
    }

    fn clear(&mut self, _color: bool, _depth: bool) {
        self.clears += 1;
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
    }

    fn create_external_texture(&mut self) -> RenderResult<TextureId> {
        let texture = TextureId(self.issue_id());
        self.textures.push(texture);
        Ok(texture)
    }

    fn create_program(&mut self, label: &str, source: &str) -> RenderResult<ProgramId> {
        let info = compile_wgsl(label, source)?;
        let program = ProgramId(self.issue_id());
        info!(label, program = program.0, "Linked program");
        self.programs.insert(program, info);
        Ok(program)
    }

    fn attrib_location(&self, program: ProgramId, name: &str) -> RenderResult<AttribLocation> {
        self.program(program)?
            .attributes
            .get(name)
            .map(|&location| AttribLocation(location))
            .ok_or_else(|| RenderError::MissingAttribute(name.to_string()))
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> RenderResult<UniformLocation> {
        self.program(program)?
            .uniforms
            .get(name)
            .map(|&location| UniformLocation(location))
            .ok_or_else(|| RenderError::MissingUniform(name.to_string()))
    }

    fn create_buffer(&mut self, kind: BufferKind, data: &[u8]) -> RenderResult<BufferId> {
        let buffer = BufferId(self.issue_id());
        self.buffers.insert(
            buffer,
            Buffer {
                kind,
                len: data.len(),
            },
        );
        Ok(buffer)
    }

    fn set_depth_test(&mut self, enabled: bool) {
        self.depth_test = enabled;
    }

    fn set_depth_write(&mut self, enabled: bool) {
        self.depth_write = enabled;
    }

    fn use_program(&mut self, program: ProgramId) -> RenderResult<()> {
        self.program(program)?;
        self.current_program = Some(program);
        Ok(())
    }

    fn bind_external_texture(&mut self, texture: TextureId) -> RenderResult<()> {
        if !self.textures.contains(&texture) {
            return Err(RenderError::InvalidHandle("texture"));
        }
        self.bound_texture = Some(texture);
        Ok(())
    }

    fn vertex_attrib_buffer(
        &mut self,
        location: AttribLocation,
        buffer: BufferId,
        components: u32,
    ) -> RenderResult<()> {
        match self.buffers.get(&buffer) {
            Some(Buffer {
                kind: BufferKind::Vertex,
                ..
            }) => {
                self.attribs
                    .insert(location.0, AttribSource::Buffer { buffer, components });
                Ok(())
            }
            _ => Err(RenderError::InvalidHandle("vertex buffer")),
        }
    }

    fn vertex_attrib_data(
        &mut self,
        location: AttribLocation,
        data: &[f32],
        components: u32,
    ) -> RenderResult<()> {
        self.attribs.insert(
            location.0,
            AttribSource::Client {
                data: data.to_vec(),
                components,
            },
        );
        Ok(())
    }

    fn disable_vertex_attrib(&mut self, location: AttribLocation) {
        self.attribs.remove(&location.0);
    }

    fn uniform_mat4(&mut self, location: UniformLocation, value: &[f32; 16]) -> RenderResult<()> {
        let (program, _) = self.current()?;
        self.uniform_values
            .insert((program, location.0), UniformValue::Mat4(*value));
        Ok(())
    }

    fn uniform_vec4(&mut self, location: UniformLocation, value: [f32; 4]) -> RenderResult<()> {
        let (program, _) = self.current()?;
        self.uniform_values
            .insert((program, location.0), UniformValue::Vec4(value));
        Ok(())
    }

    fn draw_arrays(&mut self, primitive: Primitive, count: u32) -> RenderResult<()> {
        let (_, info) = self.current()?;
        self.check_attributes(info, count)?;
        self.record(primitive, count, false)
    }

    fn draw_indexed(
        &mut self,
        primitive: Primitive,
        indices: BufferId,
        count: u32,
    ) -> RenderResult<()> {
        match self.buffers.get(&indices) {
            Some(Buffer {
                kind: BufferKind::Index,
                len,
            }) if *len >= count as usize => {}
            _ => return Err(RenderError::InvalidHandle("index buffer")),
        }
        let (_, info) = self.current()?;
        // u8 indices address at most 256 vertices; the buffers must cover what's bound
        self.check_attributes(info, 1)?;
        self.record(primitive, count, true)
    }
}
