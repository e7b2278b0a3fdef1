/*!
 * Opcode Table
 * Bounds-checked opcode → name / entry width resolution
 *
 * The opcode byte of an SQE is written by user space, so it is untrusted.
 * Every per-opcode lookup goes through [`Opcode::from_raw`], which rejects
 * out-of-range values instead of clamping them.
 */

/// Per-opcode static definition
#[derive(Debug, Clone, Copy)]
struct OpDef {
    opcode: Opcode,
    name: &'static str,
    /// Entry needs a 128-byte SQE even on a 64-byte ring
    is_128: bool,
}

macro_rules! define_opcodes {
    ($($variant:ident => $name:literal, $is_128:literal;)*) => {
        /// io_uring operation codes
        /// [LINUX-COMPAT] IORING_OP_*, in ABI order
        #[repr(u8)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Opcode {
            $($variant,)*
        }

        const OP_DEFS: &[OpDef] = &[
            $(OpDef { opcode: Opcode::$variant, name: $name, is_128: $is_128 },)*
        ];
    };
}

define_opcodes! {
    Nop => "NOP", false;
    Readv => "READV", false;
    Writev => "WRITEV", false;
    Fsync => "FSYNC", false;
    ReadFixed => "READ_FIXED", false;
    WriteFixed => "WRITE_FIXED", false;
    PollAdd => "POLL_ADD", false;
    PollRemove => "POLL_REMOVE", false;
    SyncFileRange => "SYNC_FILE_RANGE", false;
    Sendmsg => "SENDMSG", false;
    Recvmsg => "RECVMSG", false;
    Timeout => "TIMEOUT", false;
    TimeoutRemove => "TIMEOUT_REMOVE", false;
    Accept => "ACCEPT", false;
    AsyncCancel => "ASYNC_CANCEL", false;
    LinkTimeout => "LINK_TIMEOUT", false;
    Connect => "CONNECT", false;
    Fallocate => "FALLOCATE", false;
    Openat => "OPENAT", false;
    Close => "CLOSE", false;
    FilesUpdate => "FILES_UPDATE", false;
    Statx => "STATX", false;
    Read => "READ", false;
    Write => "WRITE", false;
    Fadvise => "FADVISE", false;
    Madvise => "MADVISE", false;
    Send => "SEND", false;
    Recv => "RECV", false;
    Openat2 => "OPENAT2", false;
    EpollCtl => "EPOLL_CTL", false;
    Splice => "SPLICE", false;
    ProvideBuffers => "PROVIDE_BUFFERS", false;
    RemoveBuffers => "REMOVE_BUFFERS", false;
    Tee => "TEE", false;
    Shutdown => "SHUTDOWN", false;
    Renameat => "RENAMEAT", false;
    Unlinkat => "UNLINKAT", false;
    Mkdirat => "MKDIRAT", false;
    Symlinkat => "SYMLINKAT", false;
    Linkat => "LINKAT", false;
    MsgRing => "MSG_RING", false;
    Fsetxattr => "FSETXATTR", false;
    Setxattr => "SETXATTR", false;
    Fgetxattr => "FGETXATTR", false;
    Getxattr => "GETXATTR", false;
    Socket => "SOCKET", false;
    UringCmd => "URING_CMD", false;
    SendZc => "SEND_ZC", false;
    SendmsgZc => "SENDMSG_ZC", false;
    ReadMultishot => "READ_MULTISHOT", false;
    Waitid => "WAITID", false;
    FutexWait => "FUTEX_WAIT", false;
    FutexWake => "FUTEX_WAKE", false;
    FutexWaitv => "FUTEX_WAITV", false;
    FixedFdInstall => "FIXED_FD_INSTALL", false;
    Ftruncate => "FTRUNCATE", false;
    Bind => "BIND", false;
    Listen => "LISTEN", false;
    RecvZc => "RECV_ZC", false;
    EpollWait => "EPOLL_WAIT", false;
    ReadvFixed => "READV_FIXED", false;
    WritevFixed => "WRITEV_FIXED", false;
    Pipe => "PIPE", false;
    Nop128 => "NOP128", true;
    UringCmd128 => "URING_CMD128", true;
}

/// Number of known opcodes; any raw opcode >= this is invalid
/// [LINUX-COMPAT] IORING_OP_LAST
pub const IORING_OP_LAST: u8 = OP_DEFS.len() as u8;

/// Name reported for opcodes outside the table
pub const INVALID_OPCODE_NAME: &str = "INVALID";

impl Opcode {
    /// Validate a raw opcode byte
    ///
    /// Returns `None` for any value >= [`IORING_OP_LAST`]. The value is only
    /// used as a table index after this check has passed.
    #[inline]
    pub fn from_raw(raw: u8) -> Option<Opcode> {
        OP_DEFS.get(usize::from(raw)).map(|def| def.opcode)
    }

    #[inline]
    fn def(self) -> &'static OpDef {
        // Discriminants are dense and match table order
        &OP_DEFS[self as usize]
    }

    /// Display name, as io_uring_get_opcode() reports it
    #[inline]
    pub fn name(self) -> &'static str {
        self.def().name
    }

    /// Whether this opcode needs a 128-byte SQE
    #[inline]
    pub fn is_wide(self) -> bool {
        self.def().is_128
    }

    /// Raw opcode byte
    #[inline]
    pub fn raw(self) -> u8 {
        self as u8
    }
}

/// Resolve a raw opcode to its name, `INVALID` if out of range
pub fn opcode_name(raw: u8) -> &'static str {
    Opcode::from_raw(raw)
        .map(Opcode::name)
        .unwrap_or(INVALID_OPCODE_NAME)
}

/// Whether a raw opcode needs a 128-byte SQE; false if out of range
pub fn opcode_is_wide(raw: u8) -> bool {
    Opcode::from_raw(raw).map(Opcode::is_wide).unwrap_or(false)
}
