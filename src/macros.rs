/// Stamps the public exec / query / get / select surface onto a type that
/// implements [`Resolve`](crate::ops::Resolve). Every operation has a
/// `_context` variant; the plain one runs under [`Context::background`].
#[doc(hidden)]
macro_rules! impl_statement_ops {
    ([$($generics:tt)*] $ty:ty) => {
        impl<$($generics)*> $ty {
            /// Executes a statement that returns no rows.
            pub fn exec(&self, query: &str, args: &[Value]) -> Result<ExecResult> {
                self.exec_context(&Context::background(), query, args)
            }

            /// [`exec`](Self::exec) under `ctx`.
            pub fn exec_context(
                &self,
                ctx: &Context,
                query: &str,
                args: &[Value],
            ) -> Result<ExecResult> {
                $crate::ops::exec(self, ctx, query, args)
            }

            /// Executes a statement with `:name` placeholders.
            pub fn named_exec<A: NamedArgs + ?Sized>(
                &self,
                query: &str,
                args: &A,
            ) -> Result<ExecResult> {
                self.named_exec_context(&Context::background(), query, args)
            }

            /// [`named_exec`](Self::named_exec) under `ctx`.
            pub fn named_exec_context<A: NamedArgs + ?Sized>(
                &self,
                ctx: &Context,
                query: &str,
                args: &A,
            ) -> Result<ExecResult> {
                $crate::ops::named_exec(self, ctx, query, args)
            }

            /// Runs a query and returns every row.
            pub fn query(&self, query: &str, args: &[Value]) -> Result<Rows> {
                self.query_context(&Context::background(), query, args)
            }

            /// [`query`](Self::query) under `ctx`.
            pub fn query_context(
                &self,
                ctx: &Context,
                query: &str,
                args: &[Value],
            ) -> Result<Rows> {
                $crate::ops::query(self, ctx, query, args)
            }

            /// Runs a query with `:name` placeholders and returns every row.
            pub fn named_query<A: NamedArgs + ?Sized>(
                &self,
                query: &str,
                args: &A,
            ) -> Result<Rows> {
                self.named_query_context(&Context::background(), query, args)
            }

            /// [`named_query`](Self::named_query) under `ctx`.
            pub fn named_query_context<A: NamedArgs + ?Sized>(
                &self,
                ctx: &Context,
                query: &str,
                args: &A,
            ) -> Result<Rows> {
                $crate::ops::named_query(self, ctx, query, args)
            }

            /// Runs a query and returns its first row, or
            /// [`Error::NoRows`](stmtcache_core::Error::NoRows).
            pub fn query_row(&self, query: &str, args: &[Value]) -> Result<Row> {
                self.query_row_context(&Context::background(), query, args)
            }

            /// [`query_row`](Self::query_row) under `ctx`.
            pub fn query_row_context(
                &self,
                ctx: &Context,
                query: &str,
                args: &[Value],
            ) -> Result<Row> {
                $crate::ops::query_row(self, ctx, query, args)
            }

            /// Like [`query_row`](Self::query_row) with `:name` placeholders.
            pub fn named_query_row<A: NamedArgs + ?Sized>(
                &self,
                query: &str,
                args: &A,
            ) -> Result<Row> {
                self.named_query_row_context(&Context::background(), query, args)
            }

            /// [`named_query_row`](Self::named_query_row) under `ctx`.
            pub fn named_query_row_context<A: NamedArgs + ?Sized>(
                &self,
                ctx: &Context,
                query: &str,
                args: &A,
            ) -> Result<Row> {
                $crate::ops::named_query_row(self, ctx, query, args)
            }

            /// Decodes the first row of a query into `T`.
            pub fn get<T: FromRow>(&self, query: &str, args: &[Value]) -> Result<T> {
                self.get_context(&Context::background(), query, args)
            }

            /// [`get`](Self::get) under `ctx`.
            pub fn get_context<T: FromRow>(
                &self,
                ctx: &Context,
                query: &str,
                args: &[Value],
            ) -> Result<T> {
                $crate::ops::get(self, ctx, query, args)
            }

            /// Like [`get`](Self::get) with `:name` placeholders.
            pub fn named_get<T: FromRow, A: NamedArgs + ?Sized>(
                &self,
                query: &str,
                args: &A,
            ) -> Result<T> {
                self.named_get_context(&Context::background(), query, args)
            }

            /// [`named_get`](Self::named_get) under `ctx`.
            pub fn named_get_context<T: FromRow, A: NamedArgs + ?Sized>(
                &self,
                ctx: &Context,
                query: &str,
                args: &A,
            ) -> Result<T> {
                $crate::ops::named_get(self, ctx, query, args)
            }

            /// Decodes every row of a query into `T`.
            pub fn select<T: FromRow>(&self, query: &str, args: &[Value]) -> Result<Vec<T>> {
                self.select_context(&Context::background(), query, args)
            }

            /// [`select`](Self::select) under `ctx`.
            pub fn select_context<T: FromRow>(
                &self,
                ctx: &Context,
                query: &str,
                args: &[Value],
            ) -> Result<Vec<T>> {
                $crate::ops::select(self, ctx, query, args)
            }

            /// Like [`select`](Self::select) with `:name` placeholders.
            pub fn named_select<T: FromRow, A: NamedArgs + ?Sized>(
                &self,
                query: &str,
                args: &A,
            ) -> Result<Vec<T>> {
                self.named_select_context(&Context::background(), query, args)
            }

            /// [`named_select`](Self::named_select) under `ctx`.
            pub fn named_select_context<T: FromRow, A: NamedArgs + ?Sized>(
                &self,
                ctx: &Context,
                query: &str,
                args: &A,
            ) -> Result<Vec<T>> {
                $crate::ops::named_select(self, ctx, query, args)
            }
        }
    };
}
