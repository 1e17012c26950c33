//! Demand-driven C support library.
//!
//! Each routine has one flag. Lowering sets a flag the first time it emits
//! a call to the routine; after every class has been visited, the library
//! writes exactly the routines whose flags are set, in a fixed order, ahead
//! of the generated code.

use bitflags::bitflags;

use crate::writer::CodeWriter;

bitflags! {
    /// Support routines the current source file calls.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct RuntimeFeatures: u32 {
        // === Strings ===
        const STRING_ASSIGN = 1 << 0;
        const STRING_SUBSTRING = 1 << 1;
        const STRING_APPEND = 1 << 2;
        const STRING_INDEX_OF = 1 << 3;
        const STRING_LAST_INDEX_OF = 1 << 4;
        const STRING_STARTS_WITH = 1 << 5;
        const STRING_ENDS_WITH = 1 << 6;
        const STRING_FORMAT = 1 << 7;
        const STRING_COMPARE_IGNORE_CASE = 1 << 20;
        /// Element destructor for arrays and lists of owned strings.
        const STRING_DESTRUCT = 1 << 8;

        // === Reference counting ===
        const PTR_CONSTRUCT = 1 << 9;
        const SHARED_MAKE = 1 << 10;
        const SHARED_ADD_REF = 1 << 11;
        const SHARED_RELEASE = 1 << 12;
        /// Element destructor for arrays and lists of shared pointers.
        const SHARED_DESTRUCT = 1 << 13;
        const SHARED_ASSIGN = 1 << 14;

        // === Lists ===
        /// The `FuList` struct itself, needed by any list-typed declaration.
        const LIST = 1 << 15;
        const LIST_INIT = 1 << 16;
        const LIST_ADD_SLOT = 1 << 17;
        const LIST_CLEAR = 1 << 18;
        const LIST_DESTRUCT = 1 << 19;
    }
}

impl RuntimeFeatures {
    const SHARED: Self = Self::SHARED_MAKE
        .union(Self::SHARED_ADD_REF)
        .union(Self::SHARED_RELEASE)
        .union(Self::SHARED_DESTRUCT)
        .union(Self::SHARED_ASSIGN);

    const LISTS: Self = Self::LIST
        .union(Self::LIST_INIT)
        .union(Self::LIST_ADD_SLOT)
        .union(Self::LIST_CLEAR)
        .union(Self::LIST_DESTRUCT);

    /// Close the set over the calls routines make to each other.
    #[must_use]
    pub fn with_dependencies(self) -> Self {
        let mut result = self;
        if result.intersects(Self::SHARED_ASSIGN | Self::SHARED_DESTRUCT) {
            result |= Self::SHARED_RELEASE;
        }
        if result.contains(Self::LIST_DESTRUCT) {
            result |= Self::LIST_CLEAR;
        }
        if result.intersects(Self::LISTS) {
            result |= Self::LIST;
        }
        result
    }

    /// C identifier of a single routine flag, for logging.
    pub fn routine_name(self) -> &'static str {
        ROUTINES
            .iter()
            .find(|routine| routine.flag == self)
            .map_or("FuList", |routine| routine.name)
    }

    /// Standard headers the selected routines use.
    pub fn required_includes(self) -> Vec<&'static str> {
        let mut includes = Vec::new();
        if self.intersects(
            Self::STRING_SUBSTRING
                | Self::STRING_APPEND
                | Self::STRING_INDEX_OF
                | Self::STRING_LAST_INDEX_OF
                | Self::STRING_STARTS_WITH
                | Self::STRING_ENDS_WITH,
        ) {
            includes.push("string.h");
        }
        if self.intersects(Self::STRING_STARTS_WITH | Self::STRING_ENDS_WITH) {
            includes.push("stdbool.h");
        }
        if self.contains(Self::STRING_COMPARE_IGNORE_CASE) {
            includes.push("ctype.h");
        }
        if self.contains(Self::STRING_FORMAT) {
            includes.push("stdarg.h");
            includes.push("stdio.h");
        }
        includes
    }
}

struct Routine {
    flag: RuntimeFeatures,
    name: &'static str,
    text: &'static str,
}

/// Every routine in emission order. Type definitions precede the first
/// routine that uses them.
const ROUTINES: &[Routine] = &[
    Routine {
        flag: RuntimeFeatures::STRING_ASSIGN,
        name: "FuString_Assign",
        text: "static void FuString_Assign(char **str, char *value)
{
    free(*str);
    *str = value;
}
",
    },
    Routine {
        flag: RuntimeFeatures::STRING_SUBSTRING,
        name: "FuString_Substring",
        text: "static char *FuString_Substring(const char *str, int len)
{
    char *p = malloc(len + 1);
    memcpy(p, str, len);
    p[len] = '\\0';
    return p;
}
",
    },
    Routine {
        flag: RuntimeFeatures::STRING_APPEND,
        name: "FuString_Append",
        text: "static void FuString_Append(char **str, const char *suffix)
{
    size_t suffixLen = strlen(suffix);
    if (suffixLen == 0)
        return;
    size_t prefixLen = *str == NULL ? 0 : strlen(*str);
    *str = realloc(*str, prefixLen + suffixLen + 1);
    memcpy(*str + prefixLen, suffix, suffixLen + 1);
}
",
    },
    Routine {
        flag: RuntimeFeatures::STRING_INDEX_OF,
        name: "FuString_IndexOf",
        text: "static int FuString_IndexOf(const char *str, const char *needle)
{
    const char *p = strstr(str, needle);
    return p == NULL ? -1 : (int) (p - str);
}
",
    },
    Routine {
        flag: RuntimeFeatures::STRING_LAST_INDEX_OF,
        name: "FuString_LastIndexOf",
        text: "static int FuString_LastIndexOf(const char *str, const char *needle)
{
    if (needle[0] == '\\0')
        return (int) strlen(str);
    int result = -1;
    const char *p = strstr(str, needle);
    while (p != NULL) {
        result = (int) (p - str);
        p = strstr(p + 1, needle);
    }
    return result;
}
",
    },
    Routine {
        flag: RuntimeFeatures::STRING_STARTS_WITH,
        name: "FuString_StartsWith",
        text: "static bool FuString_StartsWith(const char *str, const char *prefix)
{
    return strncmp(str, prefix, strlen(prefix)) == 0;
}
",
    },
    Routine {
        flag: RuntimeFeatures::STRING_ENDS_WITH,
        name: "FuString_EndsWith",
        text: "static bool FuString_EndsWith(const char *str, const char *suffix)
{
    size_t strLen = strlen(str);
    size_t suffixLen = strlen(suffix);
    return strLen >= suffixLen && memcmp(str + strLen - suffixLen, suffix, suffixLen) == 0;
}
",
    },
    Routine {
        flag: RuntimeFeatures::STRING_COMPARE_IGNORE_CASE,
        name: "FuString_CompareIgnoreCase",
        text: "static int FuString_CompareIgnoreCase(const char *left, const char *right)
{
    for (;;) {
        int l = tolower((unsigned char) *left++);
        int r = tolower((unsigned char) *right++);
        if (l != r || l == '\\0')
            return l - r;
    }
}
",
    },
    Routine {
        flag: RuntimeFeatures::STRING_FORMAT,
        name: "FuString_Format",
        text: "static char *FuString_Format(const char *format, ...)
{
    va_list args1;
    va_start(args1, format);
    va_list args2;
    va_copy(args2, args1);
    size_t len = vsnprintf(NULL, 0, format, args1) + 1;
    va_end(args1);
    char *str = malloc(len);
    vsnprintf(str, len, format, args2);
    va_end(args2);
    return str;
}
",
    },
    Routine {
        flag: RuntimeFeatures::PTR_CONSTRUCT,
        name: "FuPtr_Construct",
        text: "static void FuPtr_Construct(void **ptr)
{
    *ptr = NULL;
}
",
    },
    Routine {
        flag: RuntimeFeatures::STRING_DESTRUCT,
        name: "FuString_Destruct",
        text: "static void FuString_Destruct(char **str)
{
    free(*str);
}
",
    },
    Routine {
        flag: RuntimeFeatures::SHARED_MAKE,
        name: "FuShared_Make",
        text: "static void *FuShared_Make(size_t count, size_t unitSize, FuMethodPtr constructor, FuMethodPtr destructor)
{
    FuShared *self = (FuShared *) malloc(sizeof(FuShared) + count * unitSize);
    self->count = count;
    self->unitSize = unitSize;
    self->refCount = 1;
    self->destructor = destructor;
    if (constructor != NULL) {
        for (size_t i = 0; i < count; i++)
            constructor((char *) (self + 1) + i * unitSize);
    }
    return self + 1;
}
",
    },
    Routine {
        flag: RuntimeFeatures::SHARED_ADD_REF,
        name: "FuShared_AddRef",
        text: "static void *FuShared_AddRef(void *ptr)
{
    if (ptr != NULL)
        ((FuShared *) ptr)[-1].refCount++;
    return ptr;
}
",
    },
    Routine {
        flag: RuntimeFeatures::SHARED_RELEASE,
        name: "FuShared_Release",
        text: "static void FuShared_Release(void *ptr)
{
    if (ptr == NULL)
        return;
    FuShared *self = (FuShared *) ptr - 1;
    if (--self->refCount != 0)
        return;
    if (self->destructor != NULL) {
        for (size_t i = self->count; i > 0;)
            self->destructor((char *) ptr + --i * self->unitSize);
    }
    free(self);
}
",
    },
    Routine {
        flag: RuntimeFeatures::SHARED_DESTRUCT,
        name: "FuShared_Destruct",
        text: "static void FuShared_Destruct(void **ptr)
{
    FuShared_Release(*ptr);
}
",
    },
    Routine {
        flag: RuntimeFeatures::SHARED_ASSIGN,
        name: "FuShared_Assign",
        text: "static void FuShared_Assign(void **ptr, void *value)
{
    FuShared_Release(*ptr);
    *ptr = value;
}
",
    },
    Routine {
        flag: RuntimeFeatures::LIST_INIT,
        name: "FuList_Init",
        text: "static void FuList_Init(FuList *self, size_t unitSize, FuMethodPtr destructor)
{
    self->count = 0;
    self->capacity = 0;
    self->unitSize = unitSize;
    self->destructor = destructor;
    self->items = NULL;
}
",
    },
    Routine {
        flag: RuntimeFeatures::LIST_ADD_SLOT,
        name: "FuList_AddSlot",
        text: "static void *FuList_AddSlot(FuList *self)
{
    if (self->count == self->capacity) {
        self->capacity = self->capacity == 0 ? 4 : self->capacity * 2;
        self->items = realloc(self->items, self->capacity * self->unitSize);
    }
    return (char *) self->items + self->count++ * self->unitSize;
}
",
    },
    Routine {
        flag: RuntimeFeatures::LIST_CLEAR,
        name: "FuList_Clear",
        text: "static void FuList_Clear(FuList *self)
{
    if (self->destructor != NULL) {
        for (size_t i = self->count; i > 0;)
            self->destructor((char *) self->items + --i * self->unitSize);
    }
    self->count = 0;
}
",
    },
    Routine {
        flag: RuntimeFeatures::LIST_DESTRUCT,
        name: "FuList_Destruct",
        text: "static void FuList_Destruct(FuList *self)
{
    FuList_Clear(self);
    free(self->items);
}
",
    },
];

const METHOD_PTR_TYPEDEF: &str = "typedef void (*FuMethodPtr)(void *);\n";

const SHARED_TYPEDEF: &str = "typedef struct {
    size_t count;
    size_t unitSize;
    size_t refCount;
    FuMethodPtr destructor;
} FuShared;
";

const LIST_TYPEDEF: &str = "typedef struct {
    size_t count;
    size_t capacity;
    size_t unitSize;
    FuMethodPtr destructor;
    void *items;
} FuList;
";

/// Write the selected routines, each preceded by a blank line.
pub fn write_library(out: &mut CodeWriter, features: RuntimeFeatures) {
    let features = features.with_dependencies();
    let mut method_ptr_written = false;
    let mut shared_written = false;
    let mut list_written = false;

    // `FuList` is a type, not a routine; emit it even when no routine is used.
    if features.contains(RuntimeFeatures::LIST) {
        write_type(out, METHOD_PTR_TYPEDEF, &mut method_ptr_written);
        write_type(out, LIST_TYPEDEF, &mut list_written);
    }

    for routine in ROUTINES.iter().filter(|r| features.contains(r.flag)) {
        if RuntimeFeatures::SHARED.contains(routine.flag) {
            write_type(out, METHOD_PTR_TYPEDEF, &mut method_ptr_written);
            write_type(out, SHARED_TYPEDEF, &mut shared_written);
        }
        out.newline();
        out.write(routine.text);
    }
}

fn write_type(out: &mut CodeWriter, text: &str, written: &mut bool) {
    if !*written {
        out.newline();
        out.write(text);
        *written = true;
    }
}
