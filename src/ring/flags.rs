/*!
 * Ring Flag Sets
 * io_uring setup flags and completion entry flags
 */

use bitflags::bitflags;

bitflags! {
    /// io_uring_setup flags
    /// [LINUX-COMPAT] IORING_SETUP_*
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SetupFlags: u32 {
        const IOPOLL = 1 << 0;
        const SQPOLL = 1 << 1;
        const SQ_AFF = 1 << 2;
        const CQSIZE = 1 << 3;
        const CLAMP = 1 << 4;
        const ATTACH_WQ = 1 << 5;
        const R_DISABLED = 1 << 6;
        const SUBMIT_ALL = 1 << 7;
        const COOP_TASKRUN = 1 << 8;
        const TASKRUN_FLAG = 1 << 9;
        /// Every SQE is 128 bytes
        const SQE128 = 1 << 10;
        /// Every CQE is 32 bytes
        const CQE32 = 1 << 11;
        const SINGLE_ISSUER = 1 << 12;
        const DEFER_TASKRUN = 1 << 13;
        const NO_MMAP = 1 << 14;
        const REGISTERED_FD_ONLY = 1 << 15;
        /// No SQ index array; ring position maps straight to the SQE slot
        const NO_SQARRAY = 1 << 16;
        const HYBRID_IOPOLL = 1 << 17;
        /// 16 and 32 byte CQEs may be mixed, tagged per entry
        const CQE_MIXED = 1 << 18;
        /// 64 and 128 byte SQEs may be mixed, selected per opcode
        const SQE_MIXED = 1 << 19;
    }
}

bitflags! {
    /// Completion entry flags
    /// [LINUX-COMPAT] IORING_CQE_F_*
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CqeFlags: u32 {
        const BUFFER = 1 << 0;
        const MORE = 1 << 1;
        const SOCK_NONEMPTY = 1 << 2;
        const NOTIF = 1 << 3;
        const BUF_MORE = 1 << 4;
        const SKIP = 1 << 5;
        /// This CQE is 32 bytes; the next slot carries the extra words
        const F_32 = 1 << 15;
    }
}

impl SetupFlags {
    /// Left shift applied to an SQ index to get its 64-byte SQE slot
    #[inline]
    pub fn sq_shift(self) -> u32 {
        if self.contains(SetupFlags::SQE128) {
            1
        } else {
            0
        }
    }
}
