//! Generic signature rewriting.
//!
//! `Signature` attributes carry the generics the compiler erased from
//! descriptors: `<T:Ljava/lang/Object;>Lorg/lz4/Holder<TT;>;` and friends.
//! Unlike descriptors these have real grammar (type parameters, wildcards,
//! inner-class suffixes), so a linear `L...;` scan is not safe and we parse
//! them properly. The rewriter handles all three signature kinds (class,
//! method, field) with one entry point.
//!
//! Inner-class suffixes (`La/Outer<TT;>.Inner;`) name only the simple inner
//! name; the mappable binary name is the outer chain head, which is what the
//! mapper receives.

/// Error from rewriting a signature: either the string is not a valid
/// signature, or the caller's mapper failed.
#[derive(Debug, PartialEq, Eq)]
pub enum SignatureError<E> {
    /// The signature does not follow the JVMS grammar.
    Malformed {
        /// Byte offset at which parsing failed.
        pos: usize,
    },
    /// The name mapper returned an error.
    Map(E),
}

impl<E: std::fmt::Display> std::fmt::Display for SignatureError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed { pos } => write!(f, "malformed signature at byte {pos}"),
            Self::Map(e) => write!(f, "{e}"),
        }
    }
}

impl<E: std::fmt::Debug + std::fmt::Display> std::error::Error for SignatureError<E> {}

/// Rewrite every class name in a class, method, or field signature.
///
/// `map` follows the same contract as in [`crate::descriptor`]: `Ok(Some)`
/// substitutes, `Ok(None)` keeps. Returns `Ok(None)` when the signature is
/// unchanged.
///
/// # Errors
///
/// [`SignatureError::Malformed`] when the input is not a valid signature,
/// [`SignatureError::Map`] when the mapper fails.
pub fn rewrite_signature<E>(
    sig: &str,
    map: &mut impl FnMut(&str) -> Result<Option<String>, E>,
) -> Result<Option<String>, SignatureError<E>> {
    let mut rw = Rewriter {
        src: sig.as_bytes(),
        pos: 0,
        out: Vec::with_capacity(sig.len()),
        changed: false,
    };
    rw.signature(map)?;
    if rw.pos != rw.src.len() {
        return Err(SignatureError::Malformed { pos: rw.pos });
    }
    if !rw.changed {
        return Ok(None);
    }
    // The output is contiguous byte runs of a valid `&str` plus mapper
    // output, so it always decodes; the error arm is unreachable.
    let out = String::from_utf8(rw.out).map_err(|e| SignatureError::Malformed {
        pos: e.utf8_error().valid_up_to(),
    })?;
    Ok(Some(out))
}

struct Rewriter<'a> {
    src: &'a [u8],
    pos: usize,
    out: Vec<u8>,
    changed: bool,
}

impl Rewriter<'_> {
    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        self.out.push(b);
        Some(b)
    }

    fn expect<E>(&mut self, want: u8) -> Result<(), SignatureError<E>> {
        match self.peek() {
            Some(b) if b == want => {
                self.bump();
                Ok(())
            }
            _ => Err(SignatureError::Malformed { pos: self.pos }),
        }
    }

    fn fail<T, E>(&self) -> Result<T, SignatureError<E>> {
        Err(SignatureError::Malformed { pos: self.pos })
    }

    /// ClassSignature | MethodSignature | FieldSignature.
    fn signature<E>(
        &mut self,
        map: &mut impl FnMut(&str) -> Result<Option<String>, E>,
    ) -> Result<(), SignatureError<E>> {
        if self.peek() == Some(b'<') {
            self.type_params(map)?;
        }
        if self.peek() == Some(b'(') {
            // MethodSignature
            self.bump();
            while self.peek() != Some(b')') {
                if self.peek().is_none() {
                    return self.fail();
                }
                self.type_sig(map)?;
            }
            self.bump(); // ')'
            if self.peek() == Some(b'V') {
                self.bump();
            } else {
                self.type_sig(map)?;
            }
            while self.peek() == Some(b'^') {
                self.bump();
                self.type_sig(map)?;
            }
        } else {
            // ClassSignature (superclass + interfaces) or FieldSignature
            // (exactly one reference type): both are a non-empty run of
            // reference type signatures.
            if self.peek().is_none() {
                return self.fail();
            }
            while self.peek().is_some() {
                self.type_sig(map)?;
            }
        }
        Ok(())
    }

    /// `<` (Identifier `:` Bound? (`:` Bound)*)+ `>`
    fn type_params<E>(
        &mut self,
        map: &mut impl FnMut(&str) -> Result<Option<String>, E>,
    ) -> Result<(), SignatureError<E>> {
        self.expect(b'<')?;
        loop {
            // Type parameter identifier, up to the first ':'.
            let mut saw_ident = false;
            while let Some(b) = self.peek() {
                if b == b':' {
                    break;
                }
                saw_ident = true;
                self.bump();
            }
            if !saw_ident {
                return self.fail();
            }
            self.expect(b':')?;
            // Class bound may be empty.
            if matches!(self.peek(), Some(b'L' | b'T' | b'[')) {
                self.type_sig(map)?;
            }
            while self.peek() == Some(b':') {
                self.bump();
                self.type_sig(map)?;
            }
            if self.peek() == Some(b'>') {
                self.bump();
                return Ok(());
            }
            if self.peek().is_none() {
                return self.fail();
            }
        }
    }

    /// Any TypeSignature: primitive, array, type variable, or class type.
    fn type_sig<E>(
        &mut self,
        map: &mut impl FnMut(&str) -> Result<Option<String>, E>,
    ) -> Result<(), SignatureError<E>> {
        match self.peek() {
            Some(b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z') => {
                self.bump();
                Ok(())
            }
            Some(b'[') => {
                self.bump();
                self.type_sig(map)
            }
            Some(b'T') => {
                // Type variable: `T` Identifier `;`
                self.bump();
                while let Some(b) = self.bump() {
                    if b == b';' {
                        return Ok(());
                    }
                }
                self.fail()
            }
            Some(b'L') => self.class_type_sig(map),
            _ => self.fail(),
        }
    }

    /// `L` Name TypeArgs? (`.` SimpleName TypeArgs?)* `;`
    fn class_type_sig<E>(
        &mut self,
        map: &mut impl FnMut(&str) -> Result<Option<String>, E>,
    ) -> Result<(), SignatureError<E>> {
        self.expect(b'L')?;
        let start = self.pos;
        while let Some(b) = self.peek() {
            if matches!(b, b'<' | b';' | b'.') {
                break;
            }
            self.pos += 1;
        }
        if self.pos == start {
            return self.fail();
        }
        // Names in signatures are ASCII-safe in practice; non-UTF8 payloads
        // never reach here because the attribute string already decoded.
        let name = std::str::from_utf8(&self.src[start..self.pos])
            .map_err(|_| SignatureError::Malformed { pos: start })?;
        match map(name).map_err(SignatureError::Map)? {
            Some(new) => {
                self.changed = true;
                self.out.extend_from_slice(new.as_bytes());
            }
            None => self.out.extend_from_slice(name.as_bytes()),
        }
        if self.peek() == Some(b'<') {
            self.type_args(map)?;
        }
        while self.peek() == Some(b'.') {
            self.bump();
            // Simple inner name, copied verbatim.
            while let Some(b) = self.peek() {
                if matches!(b, b'<' | b';' | b'.') {
                    break;
                }
                self.bump();
            }
            if self.peek() == Some(b'<') {
                self.type_args(map)?;
            }
        }
        self.expect(b';')
    }

    /// `<` TypeArgument+ `>`
    fn type_args<E>(
        &mut self,
        map: &mut impl FnMut(&str) -> Result<Option<String>, E>,
    ) -> Result<(), SignatureError<E>> {
        self.expect(b'<')?;
        loop {
            match self.peek() {
                Some(b'>') => {
                    self.bump();
                    return Ok(());
                }
                Some(b'*') => {
                    self.bump();
                }
                Some(b'+' | b'-') => {
                    self.bump();
                    self.type_sig(map)?;
                }
                Some(_) => self.type_sig(map)?,
                None => return self.fail(),
            }
        }
    }
}
