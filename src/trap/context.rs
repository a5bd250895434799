use crate::hart::csr;

/// Register image handed to `sret` on the one-way transition into U-mode.
///
/// Layout is fixed: the entry assembly indexes `gpr` by register number
/// (x0 slot unused) and takes `sepc`/`sstatus` at known offsets.
#[repr(C)]
#[derive(Clone)]
pub struct Trapframe {
    pub gpr: [usize; 32],
    pub sepc: usize,
    pub sstatus: usize,
}

impl Trapframe {
    pub const fn zeroed() -> Self {
        Self {
            gpr: [0; 32],
            sepc: 0,
            sstatus: 0,
        }
    }

    /// Build the frame for first entry into the user program.
    ///
    /// The status image derives from the live register: previous privilege
    /// forced to U, interrupts off now but re-enabled on `sret`.
    pub fn init_user(entry: usize, sp: usize) -> Self {
        let mut tf = Self::zeroed();
        tf.sepc = entry;
        tf.gpr[2] = sp;
        tf.sstatus =
            (csr::read_status() & !(csr::STATUS_SPP | csr::STATUS_SIE)) | csr::STATUS_SPIE;
        tf
    }

    pub fn sp(&self) -> usize {
        self.gpr[2]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hart::csr;
    use crate::umem::sim;

    #[test]
    fn user_frame_forces_u_mode_with_deferred_interrupts() {
        let _g = sim::serialize();
        sim::reset();
        sim::set_status(csr::STATUS_SPP | csr::STATUS_SIE | csr::STATUS_SUM);
        let tf = Trapframe::init_user(0x1_0000, 0x7fff_fff0);
        assert_eq!(tf.sepc, 0x1_0000);
        assert_eq!(tf.sp(), 0x7fff_fff0);
        assert_eq!(tf.sstatus & csr::STATUS_SPP, 0, "previous privilege must be U");
        assert_eq!(tf.sstatus & csr::STATUS_SIE, 0);
        assert_ne!(tf.sstatus & csr::STATUS_SPIE, 0);
        // unrelated bits carry over from the live register
        assert_ne!(tf.sstatus & csr::STATUS_SUM, 0);
    }
}
