use dotmatrix_core::{
    EmuError,
    cpu::Cpu,
    interrupts::{Interrupt, InterruptSink},
    mmu::Mmu,
    registers::{FLAG_C, FLAG_H, FLAG_N, FLAG_Z, Reg16},
};

/// CPU at 0x0100 with `program` poked into the cartridge-less ROM area.
fn machine(program: &[u8]) -> (Cpu, Mmu) {
    let mut mmu = Mmu::new();
    for (i, &b) in program.iter().enumerate() {
        mmu.write_byte(0x0100 + i as u16, b);
    }
    let mut cpu = Cpu::new();
    cpu.regs.pc = 0x0100;
    cpu.regs.sp = 0xFFFE;
    (cpu, mmu)
}

fn step(cpu: &mut Cpu, mmu: &mut Mmu) -> u32 {
    cpu.step(mmu).unwrap()
}

#[test]
fn post_boot_registers() {
    let mut cpu = Cpu::new();
    cpu.init_post_boot_state();
    assert_eq!(cpu.regs.get16(Reg16::AF), 0x01B0);
    assert_eq!(cpu.regs.get16(Reg16::BC), 0x0013);
    assert_eq!(cpu.regs.get16(Reg16::DE), 0x00D8);
    assert_eq!(cpu.regs.get16(Reg16::HL), 0x014D);
    assert_eq!(cpu.regs.sp, 0xFFFE);
    assert_eq!(cpu.regs.pc, 0x0100);
}

#[test]
fn load_immediate_then_add() {
    // LD A,0x0F ; ADD A,0x01
    let (mut cpu, mut mmu) = machine(&[0x3E, 0x0F, 0xC6, 0x01]);
    assert_eq!(step(&mut cpu, &mut mmu), 8);
    assert_eq!(step(&mut cpu, &mut mmu), 8);
    assert_eq!(cpu.regs.a, 0x10);
    assert_eq!(cpu.regs.f(), FLAG_H);
    assert_eq!(cpu.regs.pc, 0x0104);
    assert_eq!(cpu.cycles, 16);
}

#[test]
fn compare_a_with_itself() {
    // LD A,0x3C ; CP A
    let (mut cpu, mut mmu) = machine(&[0x3E, 0x3C, 0xBF]);
    step(&mut cpu, &mut mmu);
    step(&mut cpu, &mut mmu);
    assert_eq!(cpu.regs.a, 0x3C);
    assert_eq!(cpu.regs.f(), FLAG_Z | FLAG_N);
}

#[test]
fn pop_af_drops_low_nibble() {
    // LD BC,0x12FF ; PUSH BC ; POP AF
    let (mut cpu, mut mmu) = machine(&[0x01, 0xFF, 0x12, 0xC5, 0xF1]);
    assert_eq!(step(&mut cpu, &mut mmu), 12);
    assert_eq!(step(&mut cpu, &mut mmu), 16);
    assert_eq!(cpu.regs.sp, 0xFFFC);
    assert_eq!(mmu.read_byte(0xFFFC), 0xFF);
    assert_eq!(mmu.read_byte(0xFFFD), 0x12);
    assert_eq!(step(&mut cpu, &mut mmu), 12);
    assert_eq!(cpu.regs.get16(Reg16::AF), 0x12F0);
    assert_eq!(cpu.regs.sp, 0xFFFE);
}

#[test]
fn push_pop_wraps_stack_pointer() {
    // LD DE,0xBEEF ; PUSH DE ; LD DE,0 ; POP DE
    let program = [0x11, 0xEF, 0xBE, 0xD5, 0x11, 0x00, 0x00, 0xD1];
    for sp in [0x0000u16, 0x0001, 0xFFFF] {
        let (mut cpu, mut mmu) = machine(&program);
        cpu.regs.sp = sp;
        for _ in 0..4 {
            step(&mut cpu, &mut mmu);
        }
        assert_eq!(cpu.regs.get16(Reg16::DE), 0xBEEF, "sp {sp:04X}");
        assert_eq!(cpu.regs.sp, sp);
    }
}

#[test]
fn call_and_return() {
    // CALL 0x0200 ; ... ; 0x0200: RET
    let (mut cpu, mut mmu) = machine(&[0xCD, 0x00, 0x02]);
    mmu.write_byte(0x0200, 0xC9);
    assert_eq!(step(&mut cpu, &mut mmu), 24);
    assert_eq!(cpu.regs.pc, 0x0200);
    assert_eq!(cpu.regs.sp, 0xFFFC);
    assert_eq!(mmu.read_byte(0xFFFC), 0x03);
    assert_eq!(mmu.read_byte(0xFFFD), 0x01);
    assert_eq!(step(&mut cpu, &mut mmu), 16);
    assert_eq!(cpu.regs.pc, 0x0103);
}

#[test]
fn relative_jumps_cost_more_when_taken() {
    // XOR A ; JR NZ,+5 ; JR Z,+2
    let (mut cpu, mut mmu) = machine(&[0xAF, 0x20, 0x05, 0x28, 0x02]);
    assert_eq!(step(&mut cpu, &mut mmu), 4);
    assert_eq!(step(&mut cpu, &mut mmu), 8);
    assert_eq!(cpu.regs.pc, 0x0103);
    assert_eq!(step(&mut cpu, &mut mmu), 12);
    assert_eq!(cpu.regs.pc, 0x0107);
}

#[test]
fn backward_jump_wraps_through_pc() {
    // JR -2 loops on itself
    let (mut cpu, mut mmu) = machine(&[0x18, 0xFE]);
    for _ in 0..3 {
        assert_eq!(step(&mut cpu, &mut mmu), 12);
        assert_eq!(cpu.regs.pc, 0x0100);
    }
}

#[test]
fn hl_increment_store_and_cb_on_memory() {
    // LD HL,0xC000 ; LD A,0x42 ; LD (HL+),A ; DEC HL ; BIT 7,(HL) ; SET 7,(HL)
    let (mut cpu, mut mmu) = machine(&[
        0x21, 0x00, 0xC0, 0x3E, 0x42, 0x22, 0x2B, 0xCB, 0x7E, 0xCB, 0xFE,
    ]);
    step(&mut cpu, &mut mmu);
    step(&mut cpu, &mut mmu);
    assert_eq!(step(&mut cpu, &mut mmu), 8);
    assert_eq!(mmu.read_byte(0xC000), 0x42);
    assert_eq!(cpu.regs.hl(), 0xC001);
    step(&mut cpu, &mut mmu);
    assert_eq!(step(&mut cpu, &mut mmu), 12);
    assert!(cpu.regs.flag(FLAG_Z));
    assert_eq!(step(&mut cpu, &mut mmu), 16);
    assert_eq!(mmu.read_byte(0xC000), 0xC2);
}

#[test]
fn sp_offset_flags() {
    // LD SP,0x00FF ; LD HL,SP+1 ; ADD SP,-1
    let (mut cpu, mut mmu) = machine(&[0x31, 0xFF, 0x00, 0xF8, 0x01, 0xE8, 0xFF]);
    step(&mut cpu, &mut mmu);
    assert_eq!(step(&mut cpu, &mut mmu), 12);
    assert_eq!(cpu.regs.hl(), 0x0100);
    assert_eq!(cpu.regs.f(), FLAG_H | FLAG_C);
    assert_eq!(step(&mut cpu, &mut mmu), 16);
    assert_eq!(cpu.regs.sp, 0x00FE);
    assert_eq!(cpu.regs.f(), FLAG_H | FLAG_C);
}

#[test]
fn ei_takes_effect_after_next_instruction() {
    // EI ; NOP ; NOP
    let (mut cpu, mut mmu) = machine(&[0xFB, 0x00, 0x00]);
    mmu.interrupts.write_ie(0x01);
    mmu.interrupts.request(Interrupt::VBlank);

    assert_eq!(step(&mut cpu, &mut mmu), 4);
    assert!(!mmu.interrupts.ime);
    assert_eq!(step(&mut cpu, &mut mmu), 4);
    assert!(mmu.interrupts.ime);
    assert_eq!(cpu.regs.pc, 0x0102);

    assert_eq!(step(&mut cpu, &mut mmu), 20);
    assert_eq!(cpu.regs.pc, 0x0040);
    assert!(!mmu.interrupts.ime);
    assert_eq!(mmu.interrupts.read_if() & 0x1F, 0);
    assert_eq!(mmu.read_byte(0xFFFC), 0x02);
    assert_eq!(mmu.read_byte(0xFFFD), 0x01);
}

#[test]
fn ei_delay_spans_a_multi_byte_instruction() {
    // EI ; LD BC,0x1234 ; NOP
    let (mut cpu, mut mmu) = machine(&[0xFB, 0x01, 0x34, 0x12, 0x00]);
    mmu.interrupts.write_ie(0x01);
    mmu.interrupts.request(Interrupt::VBlank);

    assert_eq!(step(&mut cpu, &mut mmu), 4);
    assert!(!mmu.interrupts.ime);
    assert_eq!(step(&mut cpu, &mut mmu), 12);
    assert!(mmu.interrupts.ime);
    assert_eq!(cpu.regs.get16(Reg16::BC), 0x1234);

    assert_eq!(step(&mut cpu, &mut mmu), 20);
    assert_eq!(cpu.regs.pc, 0x0040);
    assert_eq!(mmu.read_byte(0xFFFC), 0x04);
    assert_eq!(mmu.read_byte(0xFFFD), 0x01);
}

#[test]
fn di_cancels_pending_ei() {
    // EI ; DI ; NOP
    let (mut cpu, mut mmu) = machine(&[0xFB, 0xF3, 0x00]);
    mmu.interrupts.write_ie(0x01);
    mmu.interrupts.request(Interrupt::VBlank);
    for _ in 0..3 {
        step(&mut cpu, &mut mmu);
    }
    assert!(!mmu.interrupts.ime);
    assert_eq!(cpu.regs.pc, 0x0103);
}

#[test]
fn highest_priority_interrupt_wins() {
    let (mut cpu, mut mmu) = machine(&[0x00]);
    mmu.interrupts.ime = true;
    mmu.interrupts.write_ie(0x1F);
    mmu.interrupts.request(Interrupt::Joypad);
    mmu.interrupts.request(Interrupt::Timer);
    assert_eq!(step(&mut cpu, &mut mmu), 20);
    assert_eq!(cpu.regs.pc, 0x0050);
    assert_eq!(mmu.interrupts.read_if(), 0xE0 | Interrupt::Joypad.bit());
}

#[test]
fn halt_idles_then_wakes_without_ime() {
    // HALT ; INC A
    let (mut cpu, mut mmu) = machine(&[0x76, 0x3C]);
    mmu.interrupts.write_ie(0x04);
    assert_eq!(step(&mut cpu, &mut mmu), 4);
    assert!(mmu.interrupts.halted);
    assert_eq!(step(&mut cpu, &mut mmu), 4);
    assert_eq!(cpu.regs.pc, 0x0101);

    mmu.interrupts.request(Interrupt::Timer);
    step(&mut cpu, &mut mmu);
    assert!(!mmu.interrupts.halted);
    assert_eq!(cpu.regs.a, 1);
    assert_eq!(cpu.regs.pc, 0x0102);
    // Not serviced: IF is still set.
    assert_ne!(mmu.interrupts.read_if() & 0x04, 0);
}

#[test]
fn halted_cpu_services_interrupt_when_ime_set() {
    // EI ; HALT ; NOP
    let (mut cpu, mut mmu) = machine(&[0xFB, 0x76, 0x00]);
    mmu.interrupts.write_ie(0x01);
    step(&mut cpu, &mut mmu);
    step(&mut cpu, &mut mmu);
    assert!(mmu.interrupts.halted);
    assert!(mmu.interrupts.ime);
    assert_eq!(step(&mut cpu, &mut mmu), 4);

    mmu.interrupts.request(Interrupt::VBlank);
    assert_eq!(step(&mut cpu, &mut mmu), 20);
    assert!(!mmu.interrupts.halted);
    assert_eq!(cpu.regs.pc, 0x0040);
    assert_eq!(mmu.read_byte(0xFFFC), 0x02);
}

#[test]
fn halt_with_pending_interrupt_services_immediately() {
    // EI ; HALT
    let (mut cpu, mut mmu) = machine(&[0xFB, 0x76]);
    mmu.interrupts.write_ie(0x01);
    mmu.interrupts.request(Interrupt::VBlank);
    step(&mut cpu, &mut mmu);
    assert_eq!(step(&mut cpu, &mut mmu), 24);
    assert!(!mmu.interrupts.halted);
    assert_eq!(cpu.regs.pc, 0x0040);
    assert_eq!(mmu.read_byte(0xFFFC), 0x02);
    assert_eq!(mmu.read_byte(0xFFFD), 0x01);
}

#[test]
fn halt_bug_executes_next_byte_twice() {
    // HALT ; INC A ; NOP
    let (mut cpu, mut mmu) = machine(&[0x76, 0x3C, 0x00]);
    mmu.interrupts.write_ie(0x04);
    mmu.interrupts.request(Interrupt::Timer);
    step(&mut cpu, &mut mmu);
    assert!(!mmu.interrupts.halted);
    step(&mut cpu, &mut mmu);
    assert_eq!(cpu.regs.pc, 0x0101);
    step(&mut cpu, &mut mmu);
    assert_eq!(cpu.regs.a, 2);
    assert_eq!(cpu.regs.pc, 0x0102);
}

#[test]
fn reti_returns_and_enables_ime() {
    let (mut cpu, mut mmu) = machine(&[0xD9]);
    mmu.write_byte(0xFFFC, 0x34);
    mmu.write_byte(0xFFFD, 0x12);
    cpu.regs.sp = 0xFFFC;
    assert_eq!(step(&mut cpu, &mut mmu), 16);
    assert_eq!(cpu.regs.pc, 0x1234);
    assert_eq!(cpu.regs.sp, 0xFFFE);
    assert!(mmu.interrupts.ime);
}

#[test]
fn stop_skips_its_padding_byte() {
    let (mut cpu, mut mmu) = machine(&[0x10, 0x00, 0x3C]);
    assert_eq!(step(&mut cpu, &mut mmu), 4);
    assert_eq!(cpu.regs.pc, 0x0102);
}

#[test]
fn illegal_opcode_is_an_error() {
    let (mut cpu, mut mmu) = machine(&[0x00, 0xD3]);
    step(&mut cpu, &mut mmu);
    let err = cpu.step(&mut mmu).unwrap_err();
    assert!(matches!(
        err,
        EmuError::UnknownOpcode {
            opcode: 0xD3,
            pc: 0x0101
        }
    ));
}

#[test]
fn run_reaches_target_and_may_overshoot() {
    // Empty memory decodes as NOPs.
    let (mut cpu, mut mmu) = machine(&[]);
    assert_eq!(cpu.run(&mut mmu, 10).unwrap(), 12);
    assert_eq!(cpu.cycles, 12);
    assert_eq!(cpu.run(&mut mmu, 12).unwrap(), 0);
    assert_eq!(cpu.run(&mut mmu, 20).unwrap(), 8);
    assert_eq!(cpu.regs.pc, 0x0105);
}

#[test]
fn step_ticks_the_timer() {
    let (mut cpu, mut mmu) = machine(&[]);
    for _ in 0..64 {
        step(&mut cpu, &mut mmu);
    }
    assert_eq!(mmu.timer.read(0xFF04), 1);
}
