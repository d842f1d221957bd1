/// Access rights applied to a mapped region with `mprotect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryProtection {
    /// Any access faults.
    NoAccess,

    /// Pages can be read but not written.
    ReadOnly,

    /// Pages can be read and written.
    ReadWrite,
}

impl MemoryProtection {
    pub(crate) fn as_prot(self) -> libc::c_int {
        match self {
            MemoryProtection::NoAccess => libc::PROT_NONE,
            MemoryProtection::ReadOnly => libc::PROT_READ,
            MemoryProtection::ReadWrite => libc::PROT_READ | libc::PROT_WRITE,
        }
    }
}
