//! The append-only SPIR-V module builder (C6).
use spirv_headers::{AddressingModel, Capability, ExecutionModel, MemoryModel, Op};

use super::types::{ComponentType, TypeInterner};
use super::word::{pack_string, WordStream};

const SPIRV_MAGIC: u32 = 0x0723_0203;
const SPIRV_VERSION: u32 = 0x0001_0000; // 1.0
const GENERATOR: u32 = 0;
const SCHEMA: u32 = 0;

/// Bit position for a capability within the 64-bit enabled-capability mask.
/// `spirv_headers::Capability` values fit comfortably inside this range for
/// every capability this crate ever emits (see spec.md §9's note on the
/// bound).
fn capability_bit(cap: Capability) -> u64 {
    1u64 << (cap as u32)
}

pub struct Builder {
    next_id: u32,
    capabilities: u64,
    ext_inst_glsl: Option<u32>,
    execution_model: Option<ExecutionModel>,
    entry_point_id: u32,
    entry_point_name: String,
    interface: Vec<u32>,
    local_size: Option<[u32; 3]>,
    types: TypeInterner,

    debug: WordStream,
    annotations: WordStream,
    globals: WordStream,
    function: WordStream,

    void_type: u32,
    main_function_type: u32,
}

impl Builder {
    /// Start a new module for `execution_model`, bootstrapping a `void
    /// main()` function: the void type, the `void()` function type, the
    /// function header, and the entry label.
    pub fn new(execution_model: ExecutionModel) -> Builder {
        let mut builder = Builder {
            next_id: 1,
            capabilities: 0,
            ext_inst_glsl: None,
            execution_model: Some(execution_model),
            entry_point_id: 0,
            entry_point_name: "main".to_string(),
            interface: Vec::new(),
            local_size: None,
            types: TypeInterner::new(),
            debug: WordStream::new(),
            annotations: WordStream::new(),
            globals: WordStream::new(),
            function: WordStream::new(),
            void_type: 0,
            main_function_type: 0,
        };

        builder.enable_execution_model_capabilities(execution_model);

        let void_type = builder.alloc_id();
        builder.globals.op_header(Op::TypeVoid, 2);
        builder.globals.push(void_type);
        builder.void_type = void_type;
        builder.types.insert(ComponentType::Void, 1, void_type);

        let function_type = builder.alloc_id();
        builder.globals.op_header(Op::TypeFunction, 3);
        builder.globals.push(function_type);
        builder.globals.push(void_type);
        builder.main_function_type = function_type;

        let entry_point_id = builder.alloc_id();
        builder.function.op_header(Op::Function, 5);
        builder.function.push(void_type);
        builder.function.push(entry_point_id);
        builder.function.push(0); // FunctionControl: None
        builder.function.push(function_type);

        let entry_label = builder.alloc_id();
        builder.function.op_header(Op::Label, 2);
        builder.function.push(entry_label);

        builder.entry_point_id = entry_point_id;
        builder
    }

    fn enable_execution_model_capabilities(&mut self, model: ExecutionModel) {
        self.enable_capability(Capability::Shader);
        match model {
            ExecutionModel::TessellationControl | ExecutionModel::TessellationEvaluation => {
                self.enable_capability(Capability::Tessellation)
            }
            ExecutionModel::Geometry => self.enable_capability(Capability::Geometry),
            _ => {}
        }
    }

    pub fn alloc_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn enable_capability(&mut self, cap: Capability) {
        self.capabilities |= capability_bit(cap);
    }

    pub fn glsl_ext_inst_set(&mut self) -> u32 {
        if let Some(id) = self.ext_inst_glsl {
            return id;
        }
        let id = self.alloc_id();
        self.ext_inst_glsl = Some(id);
        id
    }

    pub fn add_interface(&mut self, id: u32) {
        self.interface.push(id);
    }

    pub fn set_local_size(&mut self, x: u32, y: u32, z: u32) {
        self.local_size = Some([x, y, z]);
    }

    // --- raw instruction primitives -------------------------------------

    pub fn build_op(&mut self, op: Op) {
        self.function.op_header(op, 1);
    }

    pub fn build_op1(&mut self, op: Op, a: u32) {
        self.function.op_header(op, 2);
        self.function.push(a);
    }

    pub fn build_op2(&mut self, op: Op, a: u32, b: u32) {
        self.function.op_header(op, 3);
        self.function.push(a);
        self.function.push(b);
    }

    pub fn build_op3(&mut self, op: Op, a: u32, b: u32, c: u32) {
        self.function.op_header(op, 4);
        self.function.push(a);
        self.function.push(b);
        self.function.push(c);
    }

    pub fn build_opn(&mut self, op: Op, operands: &[u32]) {
        self.function.op_header(op, 1 + operands.len() as u16);
        self.function.extend(operands);
    }

    /// Allocate a result id and emit `op result_id operands...` with no
    /// result type (e.g. `OpLabel`, `OpBranch`).
    pub fn build_op_r(&mut self, op: Op, operands: &[u32]) -> u32 {
        let id = self.alloc_id();
        self.function.op_header(op, 2 + operands.len() as u16);
        self.function.push(id);
        self.function.extend(operands);
        id
    }

    /// Allocate a result id and emit a typed result instruction:
    /// `op result_type result_id operands...`.
    pub fn build_op_tr(&mut self, op: Op, result_type: u32, operands: &[u32]) -> u32 {
        let id = self.alloc_id();
        self.function.op_header(op, 3 + operands.len() as u16);
        self.function.push(result_type);
        self.function.push(id);
        self.function.extend(operands);
        id
    }

    /// Like [`Self::build_op_r`] but emitted into the globals stream, for
    /// module-scope declarations (`OpTypePointer`, non-`Function` storage
    /// `OpVariable`s) rather than in-function instructions.
    pub fn global_op_r(&mut self, op: Op, operands: &[u32]) -> u32 {
        let id = self.alloc_id();
        self.globals.op_header(op, 2 + operands.len() as u16);
        self.globals.push(id);
        self.globals.extend(operands);
        id
    }

    /// Like [`Self::build_op_tr`] but emitted into the globals stream.
    pub fn global_op_tr(&mut self, op: Op, result_type: u32, operands: &[u32]) -> u32 {
        let id = self.alloc_id();
        self.globals.op_header(op, 3 + operands.len() as u16);
        self.globals.push(result_type);
        self.globals.push(id);
        self.globals.extend(operands);
        id
    }

    /// `OpExtInst result_type result_id set instruction operands...`.
    pub fn build_ext_inst(&mut self, result_type: u32, instruction: u32, operands: &[u32]) -> u32 {
        let set = self.glsl_ext_inst_set();
        let id = self.alloc_id();
        self.function.op_header(Op::ExtInst, 5 + operands.len() as u16);
        self.function.push(result_type);
        self.function.push(id);
        self.function.push(set);
        self.function.push(instruction);
        self.function.extend(operands);
        id
    }

    pub fn emit_name(&mut self, target: u32, name: &str) {
        let packed = pack_string(name);
        self.debug.op_header(Op::Name, 2 + packed.len() as u16);
        self.debug.push(target);
        self.debug.extend(&packed);
    }

    pub fn emit_decoration(&mut self, target: u32, decoration: spirv_headers::Decoration, operands: &[u32]) {
        self.annotations
            .op_header(Op::Decorate, 3 + operands.len() as u16);
        self.annotations.push(target);
        self.annotations.push(decoration as u32);
        self.annotations.extend(operands);
    }

    pub fn emit_member_decoration(
        &mut self,
        target: u32,
        member: u32,
        decoration: spirv_headers::Decoration,
        operands: &[u32],
    ) {
        self.annotations
            .op_header(Op::MemberDecorate, 4 + operands.len() as u16);
        self.annotations.push(target);
        self.annotations.push(member);
        self.annotations.push(decoration as u32);
        self.annotations.extend(operands);
    }

    pub fn global_push(&mut self, words: &[u32]) {
        self.globals.extend(words);
    }

    pub fn global_op_header(&mut self, op: Op, word_count: u16) {
        self.globals.op_header(op, word_count);
    }

    // --- type interning ---------------------------------------------------

    /// Cached scalar or `count`-vector (`1..=4`) type id for `component`.
    /// Vectors of void are rejected by the caller before this is invoked;
    /// this function asserts it as an invariant violation rather than a
    /// recoverable error since it can only happen from an internal bug.
    pub fn get_type_id(&mut self, component: ComponentType, count: u32) -> u32 {
        assert!((1..=4).contains(&count), "vector component count out of range");
        assert!(
            !(component == ComponentType::Void && count > 1),
            "vectors of void are not representable"
        );

        if let Some(id) = self.types.get(component, count) {
            return id;
        }

        let scalar_id = if count == 1 {
            self.build_scalar_type(component)
        } else {
            match self.types.get(component, 1) {
                Some(id) => id,
                None => self.build_scalar_type(component),
            }
        };

        let id = if count == 1 {
            scalar_id
        } else {
            let vector_id = self.alloc_id();
            self.globals.op_header(Op::TypeVector, 4);
            self.globals.push(vector_id);
            self.globals.push(scalar_id);
            self.globals.push(count);
            vector_id
        };

        self.types.insert(component, count, id);
        id
    }

    fn build_scalar_type(&mut self, component: ComponentType) -> u32 {
        if let Some(id) = self.types.get(component, 1) {
            return id;
        }
        let id = self.alloc_id();
        match component {
            ComponentType::Void => {
                self.globals.op_header(Op::TypeVoid, 2);
                self.globals.push(id);
            }
            ComponentType::Bool => {
                self.globals.op_header(Op::TypeBool, 2);
                self.globals.push(id);
            }
            ComponentType::Int => {
                self.globals.op_header(Op::TypeInt, 4);
                self.globals.push(id);
                self.globals.push(32);
                self.globals.push(1);
            }
            ComponentType::Uint => {
                self.globals.op_header(Op::TypeInt, 4);
                self.globals.push(id);
                self.globals.push(32);
                self.globals.push(0);
            }
            ComponentType::Float => {
                self.globals.op_header(Op::TypeFloat, 3);
                self.globals.push(id);
                self.globals.push(32);
            }
        }
        self.types.insert(component, 1, id);
        id
    }

    pub fn void_type(&self) -> u32 {
        self.void_type
    }

    pub fn id_bound(&self) -> u32 {
        self.next_id
    }

    /// Finish the current function (`OpReturn` if the instruction stream
    /// doesn't already end in a terminator, then `OpFunctionEnd`) and
    /// concatenate every sub-stream into a complete module image.
    pub fn build(self) -> Vec<u32> {
        self.build_inner(false)
    }

    /// Like [`Builder::build`], but omits the debug sub-stream (`OpName`
    /// and friends) entirely, matching the public façade's `--strip-debug`
    /// option.
    pub fn build_stripped(self) -> Vec<u32> {
        self.build_inner(true)
    }

    fn build_inner(mut self, strip_debug: bool) -> Vec<u32> {
        self.function.op_header(Op::FunctionEnd, 1);

        let mut words = Vec::new();
        words.push(SPIRV_MAGIC);
        words.push(SPIRV_VERSION);
        words.push(GENERATOR);
        words.push(self.id_bound());
        words.push(SCHEMA);

        for bit in 0..64u32 {
            if self.capabilities & (1u64 << bit) != 0 {
                words.push((2u32 << 16) | Op::Capability as u32);
                words.push(bit);
            }
        }

        if let Some(ext_id) = self.ext_inst_glsl {
            let packed = pack_string("GLSL.std.450");
            words.push(((2 + packed.len() as u32) << 16) | Op::ExtInstImport as u32);
            words.push(ext_id);
            words.extend(packed);
        }

        words.push((3u32 << 16) | Op::MemoryModel as u32);
        words.push(AddressingModel::Logical as u32);
        words.push(MemoryModel::GLSL450 as u32);

        if let Some(model) = self.execution_model {
            let name_words = pack_string(&self.entry_point_name);
            let word_count = 3 + name_words.len() as u32 + self.interface.len() as u32;
            words.push((word_count << 16) | Op::EntryPoint as u32);
            words.push(model as u32);
            words.push(self.entry_point_id);
            words.extend(name_words);
            words.extend(&self.interface);

            if matches!(model, ExecutionModel::GLCompute) {
                let local_size = self.local_size.unwrap_or([1, 1, 1]);
                words.push((6u32 << 16) | Op::ExecutionMode as u32);
                words.push(self.entry_point_id);
                words.push(spirv_headers::ExecutionMode::LocalSize as u32);
                words.extend(&local_size);
            }
        }

        if !strip_debug {
            words.extend(self.debug.into_words());
        }
        words.extend(self.annotations.into_words());
        words.extend(self.globals.into_words());
        words.extend(self.function.into_words());
        words
    }
}
