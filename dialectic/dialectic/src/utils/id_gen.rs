use std::marker::PhantomData;

#[derive(Debug, Clone)]
pub struct IdGenerator<T: From<usize>> {
    next_id: usize,
    phantom: PhantomData<T>,
}

impl<T: From<usize>> IdGenerator<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gen(&mut self) -> T {
        let id = self.next_id;
        self.next_id += 1;
        T::from(id)
    }

    /// Number of ids handed out so far.
    pub fn count(&self) -> usize {
        self.next_id
    }
}

impl<T: From<usize>> Default for IdGenerator<T> {
    fn default() -> IdGenerator<T> {
        IdGenerator {
            next_id: 0,
            phantom: PhantomData,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NameGenerator {
    prefix: &'static str,
    id: IdGenerator<usize>,
}

impl NameGenerator {
    pub fn new(prefix: &'static str) -> Self {
        NameGenerator {
            prefix,
            id: IdGenerator::new(),
        }
    }

    pub fn gen(&mut self) -> String {
        format!("{}{}", self.prefix, self.id.gen())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_name_generator() {
        let mut names = NameGenerator::new("__stage");
        assert_eq!(names.gen(), "__stage0");
        assert_eq!(names.gen(), "__stage1");

        let mut ids = IdGenerator::<usize>::new();
        ids.gen();
        assert_eq!(ids.count(), 1);
    }
}
