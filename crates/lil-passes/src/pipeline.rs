//! The standard pass pipeline of a compilation unit.
//!
//! Assembles the ordered pass list -- preprocessing, validation,
//! sorting, synthesis, inference, resolution, lowering -- and runs it
//! through the [`PassManager`]. The parser and the IR emitter are
//! external: the caller hands in an already built [`Document`] and
//! receives it back fully typed, lowered, and mangled.

use lil_core::Document;

use crate::arg_resolver::ArgResolver;
use crate::color_maker::ColorMaker;
use crate::config::{CompileConfig, ModuleLoader};
use crate::config_getter::ConfigGetter;
use crate::conversion_inserter::ConversionInserter;
use crate::field_sorter::FieldSorter;
use crate::importer::NeedsImporter;
use crate::method_inserter::MethodInserter;
use crate::name_lowerer::NameLowerer;
use crate::param_sorter::ParameterSorter;
use crate::preprocessor::Preprocessor;
use crate::structure_lowerer::StructureLowerer;
use crate::tree_printer::TreePrinter;
use crate::type_guesser::TypeGuesser;
use crate::type_resolver::TypeResolver;
use crate::validator::AstValidator;
use crate::visitor::{Pass, PassManager, PipelineError};

/// Builds the standard pass list for `config`.
pub fn standard_passes(
    config: &CompileConfig,
    loader: Box<dyn ModuleLoader>,
) -> Vec<Box<dyn Pass>> {
    let mut passes: Vec<Box<dyn Pass>> = Vec::new();
    if config.verbose {
        passes.push(Box::new(TreePrinter::with_headline("after parsing")));
    }
    passes.push(Box::new(NeedsImporter::new(
        loader,
        &config.dir,
        &config.file,
    )));
    passes.push(Box::new(Preprocessor::new()));
    passes.push(Box::new(ArgResolver::new(config.args.clone())));
    passes.push(Box::new(ConfigGetter::new(config.configuration.clone())));
    passes.push(Box::new(ColorMaker::new()));
    passes.push(Box::new(AstValidator::new()));
    passes.push(Box::new(FieldSorter::new()));
    passes.push(Box::new(ParameterSorter::new()));
    passes.push(Box::new(MethodInserter::new()));
    passes.push(Box::new(ConversionInserter::new()));
    passes.push(Box::new(TypeGuesser::new()));
    passes.push(Box::new(TypeResolver::new()));
    passes.push(Box::new(StructureLowerer::new()));
    passes.push(Box::new(NameLowerer::new()));
    if config.verbose {
        passes.push(Box::new(TreePrinter::with_headline("after lowering")));
    }
    passes
}

/// Runs the standard pipeline over `doc` in place.
pub fn run_pipeline(
    doc: &mut Document,
    config: &CompileConfig,
    loader: Box<dyn ModuleLoader>,
) -> Result<(), PipelineError> {
    let mut pm = PassManager::new();
    pm.set_verbose(config.verbose);
    let mut passes = standard_passes(config, loader);
    pm.execute(&mut passes, doc, &config.source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NoImports;

    #[test]
    fn empty_unit_runs_clean() {
        let mut doc = Document::new();
        doc.finalize();
        let config = CompileConfig::default();
        assert!(run_pipeline(&mut doc, &config, Box::new(NoImports)).is_ok());
    }
}
