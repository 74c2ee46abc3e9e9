//! TPF instruction stream → SPIR-V lowering (C7).
use log::warn;
use spirv_headers::{BuiltIn, Decoration, ExecutionModel, Op, StorageClass};

use crate::signature::SysValSemantic;
use crate::spirv::{Builder, ComponentType};

use super::instr::{DeclPayload, Instruction, Opcode, Operand, Register, RegisterType};
use super::symtab::{SymbolKey, SymbolTable, SymbolValue};

pub struct Compiler {
    builder: Builder,
    symtab: SymbolTable,
    temp_base: Option<u32>,
    temp_count: u32,
}

impl Compiler {
    pub fn new(execution_model: ExecutionModel) -> Compiler {
        Compiler {
            builder: Builder::new(execution_model),
            symtab: SymbolTable::new(),
            temp_base: None,
            temp_count: 0,
        }
    }

    /// Compile a full instruction stream and emit the finished SPIR-V
    /// module. Unhandled opcodes log a diagnostic and emit nothing; the
    /// rest of the stream still compiles (spec.md §4.7).
    pub fn compile(mut self, instructions: &[Instruction]) -> Vec<u32> {
        for instr in instructions {
            self.lower_instruction(instr);
        }
        self.builder.build()
    }

    /// Like [`Compiler::compile`], but drops the debug sub-stream from the
    /// final module (the public façade's `--strip-debug` option).
    pub fn compile_stripped(mut self, instructions: &[Instruction]) -> Vec<u32> {
        for instr in instructions {
            self.lower_instruction(instr);
        }
        self.builder.build_stripped()
    }

    fn lower_instruction(&mut self, instr: &Instruction) {
        match instr.opcode {
            Opcode::DclTemps => self.decl_temps(instr),
            Opcode::DclConstantBuffer => self.decl_constant_buffer(instr),
            Opcode::DclInput => self.decl_input(instr, false),
            Opcode::DclInputPs => self.decl_input(instr, true),
            Opcode::DclInputSgv => self.decl_input_sgv(instr),
            Opcode::DclOutput => self.decl_output(instr, false),
            Opcode::DclOutputSiv => self.decl_output(instr, true),
            Opcode::DclThreadGroup => self.decl_thread_group(instr),

            Opcode::Add => self.binary_float(instr, Op::FAdd),
            Opcode::Mul => self.binary_float(instr, Op::FMul),
            Opcode::Div => self.binary_float(instr, Op::FDiv),
            Opcode::And => self.binary_uint(instr, Op::BitwiseAnd),
            Opcode::Utof => self.convert_utof(instr),
            Opcode::Mov => self.mov(instr),
            Opcode::Dp2 => self.dot(instr, 2),
            Opcode::Dp3 => self.dot(instr, 3),
            Opcode::Dp4 => self.dot(instr, 4),
            Opcode::Mad => self.mad(instr),
            Opcode::Rsq => self.rsq(instr),
            Opcode::Bfi => self.bfi(instr),
            Opcode::Ret => self.builder.build_op(Op::Return),
        }
    }

    // --- declarations -----------------------------------------------------

    fn decl_temps(&mut self, instr: &Instruction) {
        let count = match instr.decl {
            DeclPayload::Temps { count } => count,
            _ => return,
        };
        let vec4_float = self.builder.get_type_id(ComponentType::Float, 4);
        let ptr_type = self.pointer_type(vec4_float, StorageClass::Function);

        let mut base = None;
        for i in 0..count {
            let id = self.builder.build_op_tr(Op::Variable, ptr_type, &[StorageClass::Function as u32]);
            self.builder.emit_name(id, &format!("r{}", i));
            if base.is_none() {
                base = Some(id);
            }
        }
        self.temp_base = base;
        self.temp_count = count;
    }

    fn decl_constant_buffer(&mut self, instr: &Instruction) {
        let (size, indexed_dynamic) = match instr.decl {
            DeclPayload::ConstantBuffer { size, indexed_dynamic } => (size, indexed_dynamic),
            _ => return,
        };
        let cb_index = instr
            .dst
            .first()
            .map(|op| op.register.index)
            .unwrap_or_default();

        let vec4_float = self.builder.get_type_id(ComponentType::Float, 4);
        let array_type = self.builder.alloc_id();
        self.builder.global_op_header(Op::TypeArray, 4);
        self.builder.global_push(&[array_type, vec4_float, size]);
        self.builder
            .emit_decoration(array_type, Decoration::ArrayStride, &[16]);

        let struct_type = self.builder.alloc_id();
        self.builder.global_op_header(Op::TypeStruct, 3);
        self.builder.global_push(&[struct_type, array_type]);
        self.builder.emit_decoration(struct_type, Decoration::Block, &[]);
        self.builder.emit_member_decoration(struct_type, 0, Decoration::Offset, &[0]);

        let ptr_type = self.pointer_type(struct_type, StorageClass::Uniform);
        let variable = self
            .builder
            .global_op_tr(Op::Variable, ptr_type, &[StorageClass::Uniform as u32]);
        self.builder
            .emit_decoration(variable, Decoration::DescriptorSet, &[0]);
        self.builder
            .emit_decoration(variable, Decoration::Binding, &[cb_index]);
        self.builder.emit_name(variable, &format!("cb{}_0", cb_index));

        if indexed_dynamic {
            self.builder
                .enable_capability(spirv_headers::Capability::UniformBufferArrayDynamicIndexing);
        }

        self.symtab.insert(
            SymbolTable::register_key(RegisterType::ConstantBuffer, cb_index),
            SymbolValue {
                id: variable,
                storage_class: Some(StorageClass::Uniform),
            },
        );
    }

    fn decl_input(&mut self, instr: &Instruction, is_pixel_shader: bool) {
        if is_pixel_shader {
            if let DeclPayload::InputInterpolation(mode) = instr.decl {
                if mode != crate::compiler::instr::InterpolationMode::Linear {
                    warn!("unsupported pixel shader interpolation mode {:?}", mode);
                }
            }
        }
        self.decl_io(instr, RegisterType::Input, StorageClass::Input, None, "v");
    }

    fn decl_input_sgv(&mut self, instr: &Instruction) {
        let sysval = match instr.decl {
            DeclPayload::SystemValue(s) => s,
            _ => return,
        };
        self.decl_io(instr, RegisterType::Input, StorageClass::Input, builtin_for(sysval), "v");
    }

    fn decl_output(&mut self, instr: &Instruction, has_siv: bool) {
        let builtin = if has_siv {
            match instr.decl {
                DeclPayload::SystemValue(s) => builtin_for(s),
                _ => None,
            }
        } else {
            None
        };
        self.decl_io(instr, RegisterType::Output, StorageClass::Output, builtin, "o");
    }

    fn decl_io(
        &mut self,
        instr: &Instruction,
        register_type: RegisterType,
        storage_class: StorageClass,
        builtin: Option<BuiltIn>,
        name_prefix: &str,
    ) {
        let index = match instr.dst.first() {
            Some(op) => op.register.index,
            None => return,
        };
        let vec4_float = self.builder.get_type_id(ComponentType::Float, 4);
        let ptr_type = self.pointer_type(vec4_float, storage_class);
        let variable = self
            .builder
            .global_op_tr(Op::Variable, ptr_type, &[storage_class as u32]);
        self.builder.emit_name(variable, &format!("{}{}", name_prefix, index));

        match builtin {
            Some(b) => self
                .builder
                .emit_decoration(variable, Decoration::BuiltIn, &[b as u32]),
            None => self
                .builder
                .emit_decoration(variable, Decoration::Location, &[index]),
        }

        self.builder.add_interface(variable);
        self.symtab.insert(
            SymbolTable::register_key(register_type, index),
            SymbolValue {
                id: variable,
                storage_class: Some(storage_class),
            },
        );
    }

    fn decl_thread_group(&mut self, instr: &Instruction) {
        if let DeclPayload::ThreadGroupSize { x, y, z } = instr.decl {
            self.builder.set_local_size(x, y, z);
        }
    }

    fn pointer_type(&mut self, pointee: u32, storage_class: StorageClass) -> u32 {
        let key = SymbolTable::pointer_type_key(pointee, storage_class);
        if let Some(v) = self.symtab.get(&key) {
            return v.id;
        }
        let id = self.builder.global_op_r(Op::TypePointer, &[storage_class as u32, pointee]);
        self.symtab.insert(
            key,
            SymbolValue {
                id,
                storage_class: Some(storage_class),
            },
        );
        id
    }

    // --- register addressing ----------------------------------------------

    fn register_pointer(&mut self, reg: &Register) -> Option<(u32, StorageClass)> {
        match reg.register_type {
            RegisterType::Temp => {
                let base = self.temp_base?;
                assert!(reg.index < self.temp_count, "temp index out of declared range");
                Some((base + reg.index, StorageClass::Function))
            }
            RegisterType::Input | RegisterType::Output | RegisterType::ColorOut => {
                let register_type = if reg.register_type == RegisterType::ColorOut {
                    RegisterType::Output
                } else {
                    reg.register_type
                };
                let key = SymbolTable::register_key(register_type, reg.index);
                self.symtab.get(&key).map(|v| (v.id, v.storage_class.unwrap()))
            }
            RegisterType::ConstantBuffer => {
                let key = SymbolTable::register_key(RegisterType::ConstantBuffer, reg.index);
                let block = self.symtab.get(&key)?;
                let vec4_float = self.builder.get_type_id(ComponentType::Float, 4);
                let ptr_type = self.pointer_type(vec4_float, StorageClass::Uniform);
                let zero = self.get_constant(ComponentType::Uint, 1, [0; 4]);
                let index = self.get_constant(ComponentType::Uint, 1, [reg.secondary_index, 0, 0, 0]);
                let chain = self.builder.build_op_tr(Op::AccessChain, ptr_type, &[block.id, zero, index]);
                Some((chain, StorageClass::Uniform))
            }
            RegisterType::ImmConst | RegisterType::ImmConst64 => None,
        }
    }

    fn get_constant(&mut self, component: ComponentType, count: u32, values: [u32; 4]) -> u32 {
        let bits = pack_bits(values, count);
        let key = SymbolTable::constant_key(component, count, bits);
        if let Some(v) = self.symtab.get(&key) {
            return v.id;
        }

        let scalar_ty = self.builder.get_type_id(component, 1);
        let id = if count == 1 {
            self.builder.global_op_tr(Op::Constant, scalar_ty, &[values[0]])
        } else {
            let component_ids: Vec<u32> = (0..count)
                .map(|i| self.builder.global_op_tr(Op::Constant, scalar_ty, &[values[i as usize]]))
                .collect();
            let vector_ty = self.builder.get_type_id(component, count);
            self.builder.global_op_tr(Op::ConstantComposite, vector_ty, &component_ids)
        };

        self.symtab.insert(
            key,
            SymbolValue {
                id,
                storage_class: None,
            },
        );
        id
    }

    // --- load / store -------------------------------------------------------

    fn emit_load_scalar(&mut self, op: &Operand, component: ComponentType) -> u32 {
        let (ptr, storage) = match self.register_pointer(&op.register) {
            Some(v) => v,
            None => return self.immediate_scalar(op, component),
        };
        let float_ptr_ty = self.pointer_type(self.builder.get_type_id(ComponentType::Float, 1), storage);
        let index = self.get_constant(ComponentType::Uint, 1, [u32::from(op.swizzle[0]), 0, 0, 0]);
        let component_ptr = self
            .builder
            .build_op_tr(Op::InBoundsAccessChain, float_ptr_ty, &[ptr, index]);
        let float_ty = self.builder.get_type_id(ComponentType::Float, 1);
        let loaded = self.builder.build_op_tr(Op::Load, float_ty, &[component_ptr]);
        self.bitcast_scalar(loaded, component)
    }

    fn immediate_scalar(&mut self, op: &Operand, component: ComponentType) -> u32 {
        match op.register.immediate {
            Some(super::instr::Immediate::U32(v)) => {
                let c = v[op.swizzle[0] as usize];
                self.get_constant(component, 1, [c, 0, 0, 0])
            }
            _ => self.get_constant(component, 1, [0; 4]),
        }
    }

    fn bitcast_scalar(&mut self, value: u32, target: ComponentType) -> u32 {
        if target == ComponentType::Float {
            return value;
        }
        let target_ty = self.builder.get_type_id(target, 1);
        self.builder.build_op_tr(Op::Bitcast, target_ty, &[value])
    }

    fn emit_load(&mut self, op: &Operand, count: u32, component: ComponentType) -> u32 {
        if count == 1 {
            return self.emit_load_scalar(op, component);
        }
        let (ptr, _storage) = match self.register_pointer(&op.register) {
            Some(v) => v,
            None => return self.immediate_vector(op, count, component),
        };
        let vec4_float = self.builder.get_type_id(ComponentType::Float, 4);
        let loaded = self.builder.build_op_tr(Op::Load, vec4_float, &[ptr]);

        let identity = count == 4 && op.swizzle == [0, 1, 2, 3];
        let value = if identity {
            loaded
        } else {
            let vec_ty = self.builder.get_type_id(ComponentType::Float, count);
            let mut operands = vec![loaded, loaded];
            operands.extend(op.swizzle[..count as usize].iter().map(|&c| u32::from(c)));
            self.builder.build_op_tr(Op::VectorShuffle, vec_ty, &operands)
        };

        if component == ComponentType::Float {
            value
        } else {
            let target_ty = self.builder.get_type_id(component, count);
            self.builder.build_op_tr(Op::Bitcast, target_ty, &[value])
        }
    }

    fn immediate_vector(&mut self, op: &Operand, count: u32, component: ComponentType) -> u32 {
        match op.register.immediate {
            Some(super::instr::Immediate::U32(v)) => {
                let mut values = [0u32; 4];
                for i in 0..count as usize {
                    values[i] = v[op.swizzle[i] as usize];
                }
                self.get_constant(component, count, values)
            }
            _ => self.get_constant(component, count, [0; 4]),
        }
    }

    fn emit_store_scalar(&mut self, op: &Operand, value: u32) {
        let (ptr, storage) = match self.register_pointer(&op.register) {
            Some(v) => v,
            None => return,
        };
        let component_index = op.write_mask.trailing_zeros();
        let float_ptr_ty = self.pointer_type(self.builder.get_type_id(ComponentType::Float, 1), storage);
        let index = self.get_constant(ComponentType::Uint, 1, [component_index, 0, 0, 0]);
        let component_ptr = self
            .builder
            .build_op_tr(Op::InBoundsAccessChain, float_ptr_ty, &[ptr, index]);
        self.builder.build_op2(Op::Store, component_ptr, value);
    }

    fn emit_store(&mut self, op: &Operand, value: u32) {
        if op.write_mask.count_ones() == 1 {
            return self.emit_store_scalar(op, value);
        }
        let (ptr, _storage) = match self.register_pointer(&op.register) {
            Some(v) => v,
            None => return,
        };
        if op.write_mask == 0xf {
            self.builder.build_op2(Op::Store, ptr, value);
            return;
        }

        let vec4_float = self.builder.get_type_id(ComponentType::Float, 4);
        let existing = self.builder.build_op_tr(Op::Load, vec4_float, &[ptr]);

        // Blend `value`'s components (indices 4..4+written) into the
        // matching lanes of `existing` (indices 0..4) via a shuffle.
        let mut written = 0u32;
        let mut indices = [0u32; 4];
        for lane in 0..4u32 {
            if op.write_mask & (1 << lane) != 0 {
                indices[lane as usize] = 4 + written;
                written += 1;
            } else {
                indices[lane as usize] = lane;
            }
        }
        let blended = self
            .builder
            .build_op_tr(Op::VectorShuffle, vec4_float, &[existing, value, indices[0], indices[1], indices[2], indices[3]]);
        self.builder.build_op2(Op::Store, ptr, blended);
    }

    // --- arithmetic ---------------------------------------------------------

    fn binary_float(&mut self, instr: &Instruction, op: Op) {
        let (dst, a, b) = match (instr.dst.first(), instr.src.first(), instr.src.get(1)) {
            (Some(d), Some(a), Some(b)) => (d, a, b),
            _ => return,
        };
        let count = dst.component_count().max(1);
        let ty = self.builder.get_type_id(ComponentType::Float, count);
        let a_id = self.emit_load(a, count, ComponentType::Float);
        let b_id = self.emit_load(b, count, ComponentType::Float);
        let result = self.builder.build_op_tr(op, ty, &[a_id, b_id]);
        self.emit_store(dst, result);
    }

    fn binary_uint(&mut self, instr: &Instruction, op: Op) {
        let (dst, a, b) = match (instr.dst.first(), instr.src.first(), instr.src.get(1)) {
            (Some(d), Some(a), Some(b)) => (d, a, b),
            _ => return,
        };
        let count = dst.component_count().max(1);
        let ty = self.builder.get_type_id(ComponentType::Uint, count);
        let a_id = self.emit_load(a, count, ComponentType::Uint);
        let b_id = self.emit_load(b, count, ComponentType::Uint);
        let result = self.builder.build_op_tr(op, ty, &[a_id, b_id]);
        self.emit_store(dst, result);
    }

    fn convert_utof(&mut self, instr: &Instruction) {
        let (dst, src) = match (instr.dst.first(), instr.src.first()) {
            (Some(d), Some(s)) => (d, s),
            _ => return,
        };
        let count = dst.component_count().max(1);
        let src_id = self.emit_load(src, count, ComponentType::Uint);
        let ty = self.builder.get_type_id(ComponentType::Float, count);
        let result = self.builder.build_op_tr(Op::ConvertUToF, ty, &[src_id]);
        self.emit_store(dst, result);
    }

    fn mov(&mut self, instr: &Instruction) {
        let (dst, src) = match (instr.dst.first(), instr.src.first()) {
            (Some(d), Some(s)) => (d, s),
            _ => return,
        };
        let count = dst.component_count().max(1);
        let value = self.emit_load(src, count, ComponentType::Float);
        self.emit_store(dst, value);
    }

    fn dot(&mut self, instr: &Instruction, n: u32) {
        let (dst, a, b) = match (instr.dst.first(), instr.src.first(), instr.src.get(1)) {
            (Some(d), Some(a), Some(b)) => (d, a, b),
            _ => return,
        };
        let a_id = self.emit_load(a, n, ComponentType::Float);
        let b_id = self.emit_load(b, n, ComponentType::Float);
        let ty = self.builder.get_type_id(ComponentType::Float, 1);
        let result = self.builder.build_op_tr(Op::Dot, ty, &[a_id, b_id]);
        self.emit_store(dst, result);
    }

    fn mad(&mut self, instr: &Instruction) {
        let (dst, a, b, c) = match (instr.dst.first(), instr.src.first(), instr.src.get(1), instr.src.get(2)) {
            (Some(d), Some(a), Some(b), Some(c)) => (d, a, b, c),
            _ => return,
        };
        let count = dst.component_count().max(1);
        let ty = self.builder.get_type_id(ComponentType::Float, count);
        let a_id = self.emit_load(a, count, ComponentType::Float);
        let b_id = self.emit_load(b, count, ComponentType::Float);
        let c_id = self.emit_load(c, count, ComponentType::Float);
        const GLSL_FMA: u32 = 50;
        let result = self.builder.build_ext_inst(ty, GLSL_FMA, &[a_id, b_id, c_id]);
        self.emit_store(dst, result);
    }

    fn rsq(&mut self, instr: &Instruction) {
        let (dst, src) = match (instr.dst.first(), instr.src.first()) {
            (Some(d), Some(s)) => (d, s),
            _ => return,
        };
        let count = dst.component_count().max(1);
        let ty = self.builder.get_type_id(ComponentType::Float, count);
        let src_id = self.emit_load(src, count, ComponentType::Float);
        const GLSL_INVERSE_SQRT: u32 = 32;
        let result = self.builder.build_ext_inst(ty, GLSL_INVERSE_SQRT, &[src_id]);
        self.emit_store(dst, result);
    }

    fn bfi(&mut self, instr: &Instruction) {
        let (dst, width, offset, insert, base) = match (
            instr.dst.first(),
            instr.src.first(),
            instr.src.get(1),
            instr.src.get(2),
            instr.src.get(3),
        ) {
            (Some(d), Some(w), Some(o), Some(i), Some(b)) => (d, w, o, i, b),
            _ => return,
        };
        let count = dst.component_count().max(1);
        let ty = self.builder.get_type_id(ComponentType::Uint, count);
        let mask = self.get_constant(ComponentType::Uint, 1, [0x1f, 0, 0, 0]);

        let width_id = self.emit_load(width, count, ComponentType::Uint);
        let width_id = self.mask_unless_literal(width, width_id, mask);
        let offset_id = self.emit_load(offset, count, ComponentType::Uint);
        let offset_id = self.mask_unless_literal(offset, offset_id, mask);
        let insert_id = self.emit_load(insert, count, ComponentType::Uint);
        let base_id = self.emit_load(base, count, ComponentType::Uint);

        let result = self
            .builder
            .build_op_tr(Op::BitFieldInsert, ty, &[base_id, insert_id, offset_id, width_id]);
        self.emit_store(dst, result);
    }

    fn mask_unless_literal(&mut self, op: &Operand, value: u32, mask: u32) -> u32 {
        if matches!(op.register.register_type, RegisterType::ImmConst) {
            return value;
        }
        let ty = self.builder.get_type_id(ComponentType::Uint, 1);
        self.builder.build_op_tr(Op::BitwiseAnd, ty, &[value, mask])
    }
}

fn builtin_for(sysval: SysValSemantic) -> Option<BuiltIn> {
    match sysval {
        SysValSemantic::Position => Some(BuiltIn::Position),
        SysValSemantic::VertexId => Some(BuiltIn::VertexIndex),
        SysValSemantic::InstanceId => Some(BuiltIn::InstanceIndex),
        SysValSemantic::PrimitiveId => Some(BuiltIn::PrimitiveId),
        SysValSemantic::IsFrontFace => Some(BuiltIn::FrontFacing),
        SysValSemantic::SampleIndex => Some(BuiltIn::SampleId),
        SysValSemantic::ClipDistance => Some(BuiltIn::ClipDistance),
        SysValSemantic::CullDistance => Some(BuiltIn::CullDistance),
        SysValSemantic::ViewportArrayIndex => Some(BuiltIn::ViewportIndex),
        SysValSemantic::RenderTargetArrayIndex => Some(BuiltIn::Layer),
        _ => None,
    }
}

fn pack_bits(values: [u32; 4], count: u32) -> u128 {
    let mut bits = 0u128;
    for i in 0..count as usize {
        bits |= u128::from(values[i]) << (32 * i);
    }
    bits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::instr::{DeclPayload, Instruction, Opcode, Operand, Register};

    fn minimal_compute_program() -> Vec<Instruction> {
        vec![
            Instruction::new(Opcode::DclThreadGroup).with_decl(DeclPayload::ThreadGroupSize { x: 8, y: 8, z: 1 }),
            Instruction::new(Opcode::DclTemps).with_decl(DeclPayload::Temps { count: 1 }),
            Instruction::new(Opcode::Mov)
                .with_dst(Operand::dst(Register::temp(0), 0xf))
                .with_src(Operand::src(Register::imm_u32([0, 0, 0, 0]), [0, 1, 2, 3])),
            Instruction::new(Opcode::Ret),
        ]
    }

    #[test]
    fn compiles_minimal_compute_program_without_panicking() {
        let compiler = Compiler::new(ExecutionModel::GLCompute);
        let words = compiler.compile(&minimal_compute_program());
        assert!(words.len() > 5);
        assert!(words.contains(&((1u32 << 16) | Op::Return as u32)));
    }

    #[test]
    fn unrecognised_program_still_terminates() {
        let compiler = Compiler::new(ExecutionModel::GLCompute);
        let words = compiler.compile(&[Instruction::new(Opcode::Ret)]);
        assert!(words.contains(&((1u32 << 16) | Op::FunctionEnd as u32)));
    }
}
