//! The contract toward textual back-ends.
//!
//! A back-end receives at most one `definition` call per instance
//! equivalence class; instances that know how to fold themselves into
//! their parent's body get an `inline` call instead.

use std::io;

use crate::{Design, InstanceId};

pub trait Renderer {
    /// Emit a standalone, named definition shared by every instance of the
    /// given representative's equivalence class.
    fn definition(&mut self, design: &Design, instance: InstanceId) -> io::Result<()>;

    /// Emit the instance as an expression or statement inside its parent's
    /// body instead of a separate definition.
    fn inline(&mut self, design: &Design, instance: InstanceId, expr: &str) -> io::Result<()>;
}

impl Design {
    /// Drives a back-end over the elaborated design, once per equivalence
    /// class, preferring inline folding where the instance supports it.
    pub fn render(&self, renderer: &mut dyn Renderer) -> io::Result<()> {
        for representative in self.definition_classes() {
            let imp = self.instance(representative).imp().clone();
            match imp.inline_expr(self, representative) {
                Some(expr) => renderer.inline(self, representative, &expr)?,
                None => renderer.definition(self, representative)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::io;

    use super::Renderer;
    use crate::{Design, ElabError, InstanceId, ModuleCtx, ModuleImpl, Ty};

    struct Leaf;

    impl ModuleImpl for Leaf {
        fn type_name(&self) -> &str {
            "leaf"
        }

        fn construct(&self, ctx: &mut ModuleCtx) -> Result<(), ElabError> {
            ctx.input("a", Ty::bit())?;
            ctx.output_typed("y", Ty::bit())?;
            Ok(())
        }

        fn inline_expr(&self, design: &Design, instance: InstanceId) -> Option<String> {
            let a = design.port(instance, "a")?;
            let xnet = design.junction(a).xnet()?;
            let parent = design.instance(instance).parent()?;
            Some(format!("~{}", design.xnet(xnet).best_name(parent)?))
        }
    }

    struct Top;

    impl ModuleImpl for Top {
        fn type_name(&self) -> &str {
            "top"
        }

        fn construct(&self, ctx: &mut ModuleCtx) -> Result<(), ElabError> {
            ctx.input("a", Ty::bit())?;
            Ok(())
        }

        fn body(&self, ctx: &mut ModuleCtx) -> Result<(), ElabError> {
            let a = ctx.port(ctx.instance(), "a")?;
            for label in ["one", "two"] {
                let leaf = ctx.add(label, Leaf)?;
                ctx.bind(ctx.port(leaf, "a")?, a)?;
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct Counting {
        definitions: Vec<String>,
        inlined: Vec<String>,
    }

    impl Renderer for Counting {
        fn definition(&mut self, design: &Design, instance: InstanceId) -> io::Result<()> {
            self.definitions.push(design.instance_path(instance));
            Ok(())
        }

        fn inline(&mut self, _design: &Design, _instance: InstanceId, expr: &str) -> io::Result<()> {
            self.inlined.push(expr.to_owned());
            Ok(())
        }
    }

    #[test]
    fn test_one_render_per_equivalence_class() {
        let mut design = Design::new();
        design.elaborate(Top).unwrap();
        let mut renderer = Counting::default();
        design.render(&mut renderer).unwrap();
        // Both leaves share one class, rendered inline exactly once.
        assert_eq!(renderer.definitions.len(), 1);
        assert_eq!(renderer.inlined, ["~a"]);
    }
}
