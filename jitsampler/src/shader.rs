//! Shader scanning
//!
//! Walks a shader and reports every texture-sample instruction (as a
//! [`SampleKey`]), every image access (as an image op kind plus multisample
//! flag) and every size query. Registration and unregistration of a shader
//! both rescan it, so the shader itself is the only record of what it uses.

use log::debug;
use naga::{
    Block, Expression, Function, Handle, ImageClass, Module, SampleLevel, Statement, TypeInner,
};

use crate::error::{Result, SamplerError};
use crate::key::{ImageOpId, ImageOpKind, LodControl, LodProperty, QueryKind, SampleKey, SampleOp};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanEvent {
    Sample(SampleKey),
    Image { kind: ImageOpKind, multisample: bool },
    Query(QueryKind),
}

impl ScanEvent {
    pub fn image_op(self) -> Option<ImageOpId> {
        match self {
            ScanEvent::Image { kind, multisample } => Some(ImageOpId::new(kind, multisample)),
            _ => None,
        }
    }
}

/// Anything that can enumerate its texture and image operations.
pub trait ShaderScanner {
    fn scan(&self, visit: &mut dyn FnMut(ScanEvent));

    fn events(&self) -> Vec<ScanEvent> {
        let mut events = Vec::new();
        self.scan(&mut |event| events.push(event));
        events
    }
}

/// Static attributes of one texture-sample instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureInstruction {
    pub op: SampleOp,
    pub lod: LodControl,
    /// LOD or bias operand is the same for every invocation.
    pub uniform_lod: bool,
    pub shadow: bool,
    pub offsets: bool,
    pub gather_component: u8,
    pub multisample: bool,
}

impl TextureInstruction {
    pub fn sample(lod: LodControl) -> Self {
        Self {
            op: SampleOp::Texture,
            lod,
            uniform_lod: true,
            shadow: false,
            offsets: false,
            gather_component: 0,
            multisample: false,
        }
    }

    pub fn fetch() -> Self {
        Self {
            op: SampleOp::Fetch,
            ..Self::sample(LodControl::Explicit)
        }
    }

    pub fn sample_key(&self) -> SampleKey {
        let property = match self.lod {
            LodControl::Implicit | LodControl::Derivatives => LodProperty::PerQuad,
            LodControl::Bias | LodControl::Explicit if self.uniform_lod => LodProperty::Scalar,
            LodControl::Bias | LodControl::Explicit => LodProperty::PerElement,
        };

        let mut key = SampleKey::new(self.op, self.lod, property);
        if self.shadow {
            key = key.with_shadow();
        }
        if self.offsets {
            key = key.with_offsets();
        }
        if self.op == SampleOp::Gather {
            key = key.with_gather_component(self.gather_component);
        }
        if self.op == SampleOp::Fetch && self.multisample {
            key = key.with_fetch_ms();
        }
        key
    }
}

/// Backend-neutral instruction stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShaderInstruction {
    Texture(TextureInstruction),
    Image { kind: ImageOpKind, multisample: bool },
    Query(QueryKind),
    Other,
}

impl ShaderScanner for [ShaderInstruction] {
    fn scan(&self, visit: &mut dyn FnMut(ScanEvent)) {
        for instruction in self {
            match *instruction {
                ShaderInstruction::Texture(texture) => visit(ScanEvent::Sample(texture.sample_key())),
                ShaderInstruction::Image { kind, multisample } => {
                    visit(ScanEvent::Image { kind, multisample })
                }
                ShaderInstruction::Query(kind) => visit(ScanEvent::Query(kind)),
                ShaderInstruction::Other => {}
            }
        }
    }
}

impl ShaderScanner for Vec<ShaderInstruction> {
    fn scan(&self, visit: &mut dyn FnMut(ScanEvent)) {
        self.as_slice().scan(visit)
    }
}

impl ShaderScanner for Module {
    fn scan(&self, visit: &mut dyn FnMut(ScanEvent)) {
        let functions = self
            .functions
            .iter()
            .map(|(_, function)| function)
            .chain(self.entry_points.iter().map(|entry| &entry.function));
        for function in functions {
            scan_function(self, function, visit);
        }
    }
}

fn scan_function(module: &Module, function: &Function, visit: &mut dyn FnMut(ScanEvent)) {
    for (_, expression) in function.expressions.iter() {
        match expression {
            Expression::ImageSample {
                gather,
                offset,
                level,
                depth_ref,
                ..
            } => {
                let (lod, uniform_lod) = match *level {
                    SampleLevel::Auto => (LodControl::Implicit, true),
                    SampleLevel::Zero => (LodControl::Explicit, true),
                    SampleLevel::Exact(value) => (LodControl::Explicit, is_constant(function, value)),
                    SampleLevel::Bias(value) => (LodControl::Bias, is_constant(function, value)),
                    SampleLevel::Gradient { .. } => (LodControl::Derivatives, true),
                };
                let instruction = TextureInstruction {
                    op: if gather.is_some() {
                        SampleOp::Gather
                    } else {
                        SampleOp::Texture
                    },
                    lod,
                    uniform_lod,
                    shadow: depth_ref.is_some(),
                    offsets: offset.is_some(),
                    gather_component: gather.map_or(0, |component| component as u8),
                    multisample: false,
                };
                visit(ScanEvent::Sample(instruction.sample_key()));
            }
            Expression::ImageLoad {
                image,
                sample,
                level,
                ..
            } => match image_class(module, function, *image) {
                Some(ImageClass::Storage { .. }) => visit(ScanEvent::Image {
                    kind: ImageOpKind::Load,
                    multisample: sample.is_some(),
                }),
                Some(_) => {
                    let instruction = TextureInstruction {
                        uniform_lod: level.map_or(true, |value| is_constant(function, value)),
                        multisample: sample.is_some(),
                        ..TextureInstruction::fetch()
                    };
                    visit(ScanEvent::Sample(instruction.sample_key()));
                }
                None => debug!("Image load on unresolved image expression {:?}", image),
            },
            Expression::ImageQuery { query, .. } => {
                let kind = match *query {
                    naga::ImageQuery::NumSamples => QueryKind::Samples,
                    _ => QueryKind::Size,
                };
                visit(ScanEvent::Query(kind));
            }
            _ => {}
        }
    }

    scan_stores(module, function, &function.body, visit);
}

fn scan_stores(module: &Module, function: &Function, block: &Block, visit: &mut dyn FnMut(ScanEvent)) {
    for statement in block.iter() {
        match statement {
            Statement::ImageStore { image, .. } => {
                let multisample = matches!(
                    image_class(module, function, *image),
                    Some(ImageClass::Sampled { multi: true, .. } | ImageClass::Depth { multi: true })
                );
                visit(ScanEvent::Image {
                    kind: ImageOpKind::Store,
                    multisample,
                });
            }
            Statement::Block(inner) => scan_stores(module, function, inner, visit),
            Statement::If { accept, reject, .. } => {
                scan_stores(module, function, accept, visit);
                scan_stores(module, function, reject, visit);
            }
            Statement::Switch { cases, .. } => {
                for case in cases {
                    scan_stores(module, function, &case.body, visit);
                }
            }
            Statement::Loop {
                body, continuing, ..
            } => {
                scan_stores(module, function, body, visit);
                scan_stores(module, function, continuing, visit);
            }
            _ => {}
        }
    }
}

fn is_constant(function: &Function, value: Handle<Expression>) -> bool {
    match function.expressions[value] {
        Expression::Literal(_) | Expression::Constant(_) | Expression::ZeroValue(_) => true,
        Expression::As { expr, .. } => is_constant(function, expr),
        _ => false,
    }
}

/// Class of the image an expression refers to, looking through binding
/// arrays, loads and function arguments.
fn image_class(module: &Module, function: &Function, image: Handle<Expression>) -> Option<ImageClass> {
    let ty = match function.expressions[image] {
        Expression::GlobalVariable(global) => module.global_variables[global].ty,
        Expression::FunctionArgument(index) => function.arguments.get(index as usize)?.ty,
        Expression::Access { base, .. }
        | Expression::AccessIndex { base, .. }
        | Expression::Load { pointer: base } => return image_class(module, function, base),
        _ => return None,
    };
    type_image_class(module, ty)
}

fn type_image_class(module: &Module, ty: Handle<naga::Type>) -> Option<ImageClass> {
    match module.types[ty].inner {
        TypeInner::Image { ref class, .. } => Some(class.clone()),
        TypeInner::BindingArray { base, .. } | TypeInner::Pointer { base, .. } => {
            type_image_class(module, base)
        }
        _ => None,
    }
}

pub fn parse_spirv(words: &[u32]) -> Result<Module> {
    let options = naga::front::spv::Options {
        adjust_coordinate_space: false,
        strict_capabilities: false,
        block_ctx_dump_prefix: None,
    };
    let module = naga::front::spv::Frontend::new(words.iter().cloned(), &options)
        .parse()
        .map_err(|e| SamplerError::ShaderParse(format!("SPIR-V parse error: {:?}", e)))?;
    debug!(
        "Parsed SPIR-V shader ({} words, {} entry points)",
        words.len(),
        module.entry_points.len()
    );
    Ok(module)
}

pub fn parse_wgsl(source: &str) -> Result<Module> {
    naga::front::wgsl::parse_str(source)
        .map_err(|e| SamplerError::ShaderParse(e.emit_to_string(source)))
}
