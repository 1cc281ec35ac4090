//! Edge case tests for hlac-par
