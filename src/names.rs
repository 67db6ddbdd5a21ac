//! Human-readable names for class and method identifiers
//!
//! Events carry 16-bit class and method ids. The table below maps them back
//! to names for the text sink. Classes and methods are numbered in the order
//! they are declared; ids outside the table resolve to `None`, and callers
//! render the raw number instead.

macro_rules! log_ids {
    (
        classes { $($class:ident),* $(,)? }
        methods { $($variant:ident => $owner:ident :: $method:ident),* $(,)? }
    ) => {
        /// Registered classes
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u16)]
        #[allow(missing_docs)]
        pub enum ClassId {
            $($class,)*
        }

        /// Registered methods
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u16)]
        #[allow(missing_docs)]
        pub enum MethodId {
            $($variant,)*
        }

        const CLASS_NAMES: &[&str] = &[$(stringify!($class),)*];

        const METHODS: &[(ClassId, &str)] = &[$((ClassId::$owner, stringify!($method)),)*];

        const CLASSES: &[ClassId] = &[$(ClassId::$class,)*];

        const METHOD_IDS: &[MethodId] = &[$(MethodId::$variant,)*];
    };
}

log_ids! {
    classes {
        Server,
        Handler,
        Database,
    }
    methods {
        ServerAddEvent => Server::AddEvent,
        ServerStart => Server::Start,
        ServerStop => Server::Stop,
        HandlerRun => Handler::Run,
        HandlerAddEvent => Handler::addEvent,
        HandlerTerminateThreads => Handler::terminateThreads,
        DatabaseQuery => Database::Query,
        DatabaseCommit => Database::Commit,
    }
}

impl ClassId {
    /// Number of registered classes
    pub const COUNT: usize = CLASS_NAMES.len();

    /// Numeric id carried in event headers
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Look up a class by numeric id
    pub fn from_u16(id: u16) -> Option<Self> {
        CLASSES.get(id as usize).copied()
    }

    /// Registered name
    pub fn name(self) -> &'static str {
        CLASS_NAMES[self as usize]
    }
}

impl MethodId {
    /// Number of registered methods
    pub const COUNT: usize = METHODS.len();

    /// Numeric id carried in event headers
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Look up a method by numeric id
    pub fn from_u16(id: u16) -> Option<Self> {
        METHOD_IDS.get(id as usize).copied()
    }

    /// Registered method name (without the class)
    pub fn name(self) -> &'static str {
        METHODS[self as usize].1
    }

    /// Class the method belongs to
    pub fn class(self) -> ClassId {
        METHODS[self as usize].0
    }
}

/// Name of the class with numeric id `id`
pub fn class_name(id: u16) -> Option<&'static str> {
    ClassId::from_u16(id).map(ClassId::name)
}

/// Name of the method with numeric id `id`
pub fn method_name(id: u16) -> Option<&'static str> {
    MethodId::from_u16(id).map(MethodId::name)
}

/// Class owning the method with numeric id `id`
pub fn method_class(id: u16) -> Option<ClassId> {
    MethodId::from_u16(id).map(MethodId::class)
}
